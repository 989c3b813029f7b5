//! An orchestrator loop fanning metric output out to several sinks.

use pretty_assertions::assert_eq;
use serde_json::json;

use trainkit_core::{Metric, Observation, StreamingMetric};
use trainkit_report::{ConsoleLogger, LogScope, LogdirLogger, MetricLogger, StepContext};

fn loaders() -> Vec<(&'static str, Vec<(f64, u64)>)> {
    vec![
        ("train", vec![(1.0, 4), (0.5, 4)]),
        ("valid", vec![(0.75, 8)]),
    ]
}

#[test]
fn test_epochs_fan_out_to_console_and_logdir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut sinks: Vec<Box<dyn MetricLogger>> = vec![
        Box::new(ConsoleLogger::new()),
        Box::new(LogdirLogger::new(dir.path().join("logs"))?),
    ];
    for sink in &mut sinks {
        sink.log_hparams(&json!({"lr": 0.5, "epochs": 2}), Some("smoke"))?;
    }

    let mut loss = StreamingMetric::average("loss");
    for epoch in 1..=2 {
        for (loader, batches) in loaders() {
            loss.reset();
            let ctx = StepContext::for_loader(loader).with_epoch(epoch, 2);
            for (value, weight) in batches {
                if loss
                    .call(Observation::scalar(value / epoch as f64, weight))?
                    .is_some()
                {
                    let batch = loss.compute_key_value();
                    for sink in &mut sinks {
                        sink.log_metrics(&batch, LogScope::Batch, &ctx)?;
                    }
                }
            }
            let summary = loss.compute_key_value();
            for sink in &mut sinks {
                sink.log_metrics(&summary, LogScope::Loader, &ctx)?;
                sink.log_metrics(&summary, LogScope::Epoch, &ctx)?;
            }
        }
    }
    for sink in &mut sinks {
        sink.close()?;
    }

    let train = std::fs::read_to_string(dir.path().join("logs/train.csv"))?;
    let lines: Vec<&str> = train.lines().collect();
    assert_eq!(lines[0], "step,loss_mean,loss_std");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("1,0.75,"));
    assert!(lines[2].starts_with("2,0.375,"));

    let valid = std::fs::read_to_string(dir.path().join("logs/valid.csv"))?;
    assert_eq!(valid, "step,loss_mean,loss_std\n1,0.75,0\n2,0.375,0\n");

    let hparams: serde_json::Value =
        serde_yaml::from_str(&std::fs::read_to_string(dir.path().join("logs/hparams.yml"))?)?;
    assert_eq!(hparams["epochs"], json!(2));
    Ok(())
}
