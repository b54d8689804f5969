mod common;

use std::io::Write;

use common::{full_spec, signal, synthetic_sales};
use sales_forecast::config::StoreSection;
use sales_forecast::{
    Evaluator, FitOptions, ForecastConfig, ForecastError, ModelState, Pipeline, SeasonalModel,
};

#[test]
fn test_holdout_on_trend_seasonal_series() {
    let series = synthetic_sales(48, 0.2, 17);
    let result = Evaluator::new(full_spec(), FitOptions::default())
        .evaluate(&series, 12)
        .unwrap();

    assert_eq!(result.train_len, 36);
    assert_eq!(result.test_range.len(), 12);
    assert_eq!(result.test_range.end, series.end());
    assert!(result.metrics.rmse < 8.0, "rmse = {}", result.metrics.rmse);
    assert!(result.metrics.mae <= result.metrics.rmse + 1e-12);
    assert_eq!(result.metrics.mape_excluded, 0);
    assert!(result.metrics.mape.unwrap() < 5.0);
}

#[test]
fn test_full_model_forecast_tracks_signal() {
    let series = synthetic_sales(48, 0.2, 17);
    let mut model = SeasonalModel::new(full_spec(), FitOptions::default());
    let fitted = model.fit(&series).unwrap();
    assert_eq!(model.state(), ModelState::Fit);

    let fc = fitted.forecast(12, 0.95).unwrap();
    assert_eq!(fc.points.len(), 12);
    assert_eq!(fc.points[0].period, series.end().succ());
    for (h, p) in fc.points.iter().enumerate() {
        let truth = signal(48 + h);
        assert!(
            (p.point_estimate - truth).abs() < 10.0,
            "h={} forecast {} vs {}",
            h + 1,
            p.point_estimate,
            truth
        );
        assert!(p.lower_bound <= p.point_estimate && p.point_estimate <= p.upper_bound);
    }
    assert!(matches!(
        SeasonalModel::forecast(&fitted, 0, 0.95),
        Err(ForecastError::InvalidHorizon { horizon: 0 })
    ));
}

#[test]
fn test_pipeline_run_persists_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("out").join("forecast.csv");
    let config = ForecastConfig {
        store: StoreSection {
            dir: dir.path().join("models"),
            forecast_table: Some(table.clone()),
        },
        ..ForecastConfig::default()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let series = synthetic_sales(48, 0.2, 29);
    let report = pipeline.run(&series).unwrap();

    assert_eq!(report.stationarity.len(), 4);
    assert_eq!(report.evaluation.train_len, 36);
    assert_eq!(report.fit.training_window, series.range());
    assert_eq!(
        pipeline.store().latest_id().unwrap().as_deref(),
        Some(report.artifact_id.as_str())
    );

    let served = &report.forecast;
    assert_eq!(served.artifact_id, report.artifact_id);
    assert_eq!(served.forecast.horizon, 12);
    assert_eq!(served.forecast.confidence_level, 0.95);
    assert_eq!(served.forecast.points[0].period.to_string(), "2020-01");
    assert_eq!(served.forecast.points[11].period.to_string(), "2020-12");

    let artifact = pipeline.store().load_artifact("latest").unwrap();
    let metrics = artifact.metadata.evaluation.unwrap();
    assert_eq!(metrics.test_range, report.evaluation.test_range);
    assert_eq!(metrics.rmse, report.evaluation.metrics.rmse);

    let text = std::fs::read_to_string(&table).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[0], "period,point_forecast,lower_bound,upper_bound");
    assert!(lines[1].starts_with("2020-01,"));
}

#[test]
fn test_pipeline_from_transactions() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("sales_cleaned.csv");
    let series = synthetic_sales(48, 0.2, 5);
    {
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "order_id,order_date,sales,profit").unwrap();
        for (i, (period, value)) in series.iter().enumerate() {
            // two orders per month that add up to the monthly total
            writeln!(f, "A{},{}-03,{},0", i, period, value * 0.25).unwrap();
            writeln!(f, "B{},{}-21,{},0", i, period, value * 0.75).unwrap();
        }
    }

    let config = ForecastConfig {
        store: StoreSection {
            dir: dir.path().join("models"),
            forecast_table: None,
        },
        ..ForecastConfig::default()
    };
    let report = Pipeline::new(config).unwrap().run_csv(&csv_path).unwrap();
    assert_eq!(report.fit.training_window, series.range());
    assert_eq!(report.forecast.forecast.points.len(), 12);
}
