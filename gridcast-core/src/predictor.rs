use std::{fmt::Debug, path::Path};

use tracing::info;

use crate::{
    error::{GridcastError, Result},
    features::{DEFAULT_FEATURE_ORDER, FeatureRow},
};

pub mod lightgbm;

pub use lightgbm::LightGbmModel;

/// A trained model mapping one feature vector to one scalar.
pub trait Predictor: Send + Sync + Debug {
    /// Names of the expected features, in vector order.
    fn feature_names(&self) -> &[String];

    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Lays `row` out in this model's feature order (dropping the date) and predicts.
    fn predict_row(&self, row: &FeatureRow) -> Result<f64> {
        let vector = row.to_vector(self.feature_names())?;
        self.predict(&vector)
    }
}

/// Load a serialized LightGBM text model from disk.
///
/// Every feature the model names must be one a [`FeatureRow`] can supply.
pub fn load_model(path: &Path) -> Result<Box<dyn Predictor>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        GridcastError::ModelInvocation(format!(
            "failed to read model artifact {}: {e}",
            path.display()
        ))
    })?;

    let model = LightGbmModel::parse(&text).map_err(|e| match e {
        GridcastError::ModelInvocation(msg) => {
            GridcastError::ModelInvocation(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;

    if let Some(unknown) =
        model.feature_names().iter().find(|n| !DEFAULT_FEATURE_ORDER.contains(&n.as_str()))
    {
        return Err(GridcastError::ModelInvocation(format!(
            "{}: model expects feature '{unknown}', which is not part of the feature row",
            path.display()
        )));
    }

    info!(
        path = %path.display(),
        trees = model.num_trees(),
        features = model.feature_names().len(),
        "model loaded"
    );
    Ok(Box::new(model))
}
