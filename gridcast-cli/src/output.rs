use gridcast_core::{DailyForecast, metrics::HistoryAccuracy};

pub fn print_forecast(forecast: &[DailyForecast]) {
    if forecast.is_empty() {
        println!("No pending forecast.");
        return;
    }

    println!("{:<12} {:>16} {:>14}", "Date", "Generation (GW)", "Loadshed (GW)");
    for day in forecast {
        println!(
            "{:<12} {:>16.3} {:>14.3}",
            day.date.to_string(),
            day.prediction.generation,
            day.prediction.loadshed
        );
    }
}

pub fn print_accuracy(accuracy: Option<&HistoryAccuracy>) {
    let Some(acc) = accuracy else {
        println!("No labeled history yet.");
        return;
    };

    println!("Accuracy over {} labeled days:", acc.generation.sample_count);
    for (name, m) in [("generation", &acc.generation), ("loadshed", &acc.loadshed)] {
        let mape = m.mape.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"));
        println!("  {name:<10} MAE {:.3} GW  RMSE {:.3} GW  MAPE {mape}", m.mae, m.rmse);
    }
}
