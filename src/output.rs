use std::fmt::{self, Write};

use crate::error::{Error, Result};
use crate::models::SimConfig;
use crate::state::{SimulationResult, TierMetrics};

pub trait Formatter {
    fn write(&self, result: &SimulationResult) -> Result<String>;
}

pub struct HumanFormatter;
pub struct SummaryFormatter;
pub struct JsonFormatter;
pub struct CsvFormatter;

fn line(out: &mut String, args: fmt::Arguments) -> Result<()> {
    out.write_fmt(args)
        .and_then(|()| out.write_char('\n'))
        .map_err(|err| Error::Output(format!("failed to render output: {}", err)))
}

impl Formatter for HumanFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let meta = &result.metadata;
        let mut out = String::new();
        line(&mut out, format_args!("Metadata:"))?;
        line(&mut out, format_args!("seed: {}", meta.seed))?;
        line(&mut out, format_args!("call_mode: {}", meta.call_mode))?;
        line(&mut out, format_args!("timing: {}", meta.timing))?;
        line(&mut out, format_args!("clients: {}", meta.clients))?;
        line(&mut out, format_args!("horizon: {}", meta.horizon))?;
        line(&mut out, format_args!("elapsed: {}", meta.elapsed))?;
        line(&mut out, format_args!("events_processed: {}", meta.events_processed))?;
        line(&mut out, format_args!("requests_issued: {}", meta.requests_issued))?;

        for tier in [&result.app, &result.db] {
            write_tier(&mut out, tier)?;
        }

        let system = &result.system;
        line(&mut out, format_args!("System:"))?;
        line(&mut out, format_args!("  throughput: {}", system.throughput))?;
        line(&mut out, format_args!("  goodput: {}", system.goodput))?;
        line(&mut out, format_args!("  badput: {}", system.badput))?;
        line(
            &mut out,
            format_args!("  avg_response_time: {}", system.avg_response_time),
        )?;
        line(
            &mut out,
            format_args!(
                "  drops: {} priority, {} regular ({} overflow, {} timeout)",
                system.priority_drops,
                system.regular_drops,
                system.overflow_drops,
                system.timeout_drops
            ),
        )?;
        line(&mut out, format_args!("  retries: {}", system.retries))?;
        Ok(out)
    }
}

fn write_tier(out: &mut String, tier: &TierMetrics) -> Result<()> {
    line(out, format_args!("Tier {} ({} cores):", tier.name, tier.cores))?;
    line(out, format_args!("  throughput: {}", tier.throughput))?;
    line(out, format_args!("  goodput: {}", tier.goodput))?;
    line(out, format_args!("  badput: {}", tier.badput))?;
    line(out, format_args!("  avg_response_time: {}", tier.avg_response_time))?;
    line(
        out,
        format_args!(
            "  occupancy: {} (peak {}, avg {})",
            tier.occupancy, tier.peak_occupancy, tier.avg_occupancy
        ),
    )?;
    line(out, format_args!("  overflow_drops: {}", tier.overflow_drops))?;
    line(
        out,
        format_args!(
            "  utilization: {} (avg {})",
            tier.utilization, tier.avg_utilization
        ),
    )
}

impl Formatter for SummaryFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let meta = &result.metadata;
        let mut out = String::new();
        line(&mut out, format_args!("Metadata:"))?;
        line(&mut out, format_args!("seed: {}", meta.seed))?;
        line(&mut out, format_args!("call_mode: {}", meta.call_mode))?;
        line(&mut out, format_args!("elapsed: {}", meta.elapsed))?;
        line(&mut out, format_args!("Summary:"))?;
        for tier in [&result.app, &result.db] {
            line(
                &mut out,
                format_args!(
                    "{}: {} completions (goodput: {}, badput: {}, avg response: {})",
                    tier.name, tier.completions, tier.goodput, tier.badput, tier.avg_response_time
                ),
            )?;
        }
        let system = &result.system;
        line(
            &mut out,
            format_args!(
                "system: {} completions (throughput: {}, drops: {} priority / {} regular)",
                system.completions, system.throughput, system.priority_drops, system.regular_drops
            ),
        )?;
        Ok(out)
    }
}
impl Formatter for JsonFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let mut json = serde_json::to_string_pretty(result)
            .map_err(|err| Error::Output(format!("failed to encode JSON: {}", err)))?;
        json.push('\n');
        Ok(json)
    }
}

/// Flat `metric,value` rows, one per reported number.
impl Formatter for CsvFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let meta = &result.metadata;
        let mut rows: Vec<(String, String)> = vec![
            ("metadata.seed".into(), meta.seed.to_string()),
            ("metadata.call_mode".into(), meta.call_mode.clone()),
            ("metadata.timing".into(), meta.timing.clone()),
            ("metadata.clients".into(), meta.clients.to_string()),
            ("metadata.horizon".into(), meta.horizon.to_string()),
            ("metadata.elapsed".into(), meta.elapsed.to_string()),
            (
                "metadata.events_processed".into(),
                meta.events_processed.to_string(),
            ),
        ];

        for tier in [&result.app, &result.db] {
            let prefix = &tier.name;
            let values = [
                ("cores", tier.cores.to_string()),
                ("throughput", tier.throughput.to_string()),
                ("goodput", tier.goodput.to_string()),
                ("badput", tier.badput.to_string()),
                ("avg_response_time", tier.avg_response_time.to_string()),
                ("occupancy", tier.occupancy.to_string()),
                ("peak_occupancy", tier.peak_occupancy.to_string()),
                ("avg_occupancy", tier.avg_occupancy.to_string()),
                ("overflow_drops", tier.overflow_drops.to_string()),
                ("utilization", tier.utilization.to_string()),
                ("avg_utilization", tier.avg_utilization.to_string()),
            ];
            rows.extend(
                values
                    .into_iter()
                    .map(|(name, value)| (format!("{}.{}", prefix, name), value)),
            );
        }

        let system = &result.system;
        let values = [
            ("throughput", system.throughput.to_string()),
            ("goodput", system.goodput.to_string()),
            ("badput", system.badput.to_string()),
            ("avg_response_time", system.avg_response_time.to_string()),
            ("priority_drops", system.priority_drops.to_string()),
            ("regular_drops", system.regular_drops.to_string()),
            ("overflow_drops", system.overflow_drops.to_string()),
            ("timeout_drops", system.timeout_drops.to_string()),
            ("retries", system.retries.to_string()),
        ];
        rows.extend(
            values
                .into_iter()
                .map(|(name, value)| (format!("system.{}", name), value)),
        );

        let mut out = String::from("metric,value\n");
        for (metric, value) in rows {
            line(&mut out, format_args!("{},{}", metric, value))?;
        }
        Ok(out)
    }
}

pub fn describe_config(config: &SimConfig) -> Result<String> {
    let mut out = String::new();
    for (label, tier) in [("Application", &config.app), ("Database", &config.db)] {
        line(
            &mut out,
            format_args!(
                "{} tier: {} cores, service time {}, queue capacity {}",
                label, tier.cores, tier.service_time, tier.queue_capacity
            ),
        )?;
    }
    line(&mut out, format_args!("app_to_db_prob: {}", config.app_to_db_prob))?;
    line(&mut out, format_args!("think_time: {}", config.think_time))?;
    line(
        &mut out,
        format_args!("high_priority_prob: {}", config.high_priority_prob),
    )?;
    line(&mut out, format_args!("clients: {}", config.clients))?;
    line(&mut out, format_args!("horizon: {}", config.horizon))?;
    line(&mut out, format_args!("retry_delay: {}", config.retry_delay))?;
    line(&mut out, format_args!("timeout: {}", config.timeout))?;
    line(&mut out, format_args!("call_mode: {}", config.call_mode))?;
    line(&mut out, format_args!("timing: {}", config.timing))?;
    line(&mut out, format_args!("seed: {}", config.seed.unwrap_or(0)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run_simulation;
    use crate::models::{Timing, TierConfig};

    fn result() -> SimulationResult {
        let config = SimConfig {
            app: TierConfig {
                cores: 1,
                service_time: 1.0,
                queue_capacity: 10,
            },
            app_to_db_prob: 0.0,
            think_time: 0.0,
            clients: 1,
            horizon: 4.0,
            timing: Timing::Constant,
            ..SimConfig::default()
        };
        run_simulation(&config).expect("simulation should succeed")
    }

    #[test]
    fn summary_lists_tiers_then_system() {
        let output = SummaryFormatter.write(&result()).unwrap();
        assert_eq!(
            output,
            concat!(
                "Metadata:\n",
                "seed: 0\n",
                "call_mode: async\n",
                "elapsed: 4\n",
                "Summary:\n",
                "app: 4 completions (goodput: 4, badput: 0, avg response: 1)\n",
                "db: 0 completions (goodput: 0, badput: 0, avg response: 0)\n",
                "system: 4 completions (throughput: 1, drops: 0 priority / 0 regular)\n",
            )
        );
    }

    #[test]
    fn csv_has_one_row_per_metric() {
        let output = CsvFormatter.write(&result()).unwrap();
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("metric,value"));
        assert!(output.contains("\napp.throughput,1\n"));
        assert!(output.contains("\napp.avg_utilization,1\n"));
        assert!(output.contains("\nsystem.goodput,4\n"));
        assert_eq!(output.lines().count(), 1 + 7 + 2 * 11 + 9);
    }

    #[test]
    fn json_round_trips_through_serde_json() {
        let output = JsonFormatter.write(&result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["system"]["completions"], 4);
        assert_eq!(value["app"]["name"], "app");
        assert_eq!(value["metadata"]["call_mode"], "async");
    }

    #[test]
    fn lines_end_with_a_newline() {
        let mut out = String::new();
        line(&mut out, format_args!("a: {}", 1)).unwrap();
        line(&mut out, format_args!("b")).unwrap();
        assert_eq!(out, "a: 1\nb\n");
    }

    #[test]
    fn config_description_is_stable() {
        let description = describe_config(&SimConfig::default()).unwrap();
        assert!(description.starts_with(
            "Application tier: 2 cores, service time 1, queue capacity 10\n"
        ));
        assert!(description.ends_with("timing: exponential\nseed: 0\n"));
    }
}
