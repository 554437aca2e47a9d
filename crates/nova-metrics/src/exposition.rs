//! Prometheus text exposition format.
//!
//! Renders the samples of one collection pass for scraping by a
//! Prometheus server or compatible agent. Every metric is a gauge.

use std::collections::HashMap;
use std::fmt::Write;

use tokio::sync::mpsc;

use crate::registry::{CollectReport, Exporter};
use crate::sample::Sample;

/// Render samples grouped per metric, metrics in first-seen order.
pub fn render_prometheus(samples: &[Sample]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Sample>> = HashMap::new();
    for s in samples {
        groups
            .entry(s.name())
            .or_insert_with(|| {
                order.push(s.name());
                Vec::new()
            })
            .push(s);
    }

    let mut out = String::new();
    for name in order {
        let group = &groups[name];
        let desc = &group[0].desc;
        if !desc.help.is_empty() {
            let _ = writeln!(out, "# HELP {} {}", desc.name, escape_help(desc.help));
        }
        let _ = writeln!(out, "# TYPE {} gauge", desc.name);
        for s in group {
            out.push_str(&desc.name);
            if !s.labels.is_empty() {
                out.push('{');
                for (i, (key, value)) in desc.labels.iter().zip(&s.labels).enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{key}=\"{}\"", escape_label(value));
                }
                out.push('}');
            }
            out.push(' ');
            out.push_str(&format_value(s.value));
            out.push('\n');
        }
    }
    out
}

/// Run one collection pass and render it. Collection and draining run
/// concurrently so the bounded channel never deadlocks.
pub async fn scrape(exporter: &Exporter) -> (CollectReport, String) {
    let (tx, mut rx) = mpsc::channel(exporter.options().channel_capacity.max(1));

    let collect = async move {
        // Dropping the sender ends the drain loop.
        exporter.collect(&tx).await
    };
    let drain = async move {
        let mut samples = Vec::new();
        while let Some(s) = rx.recv().await {
            samples.push(s);
        }
        samples
    };

    let (report, samples) = tokio::join!(collect, drain);
    (report, render_prometheus(&samples))
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
