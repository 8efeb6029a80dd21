//! Human-friendly text output.

use tempwatch_core::{
    LiveObservation, PerformanceComparison, SeasonalSummary,
    analysis::{CrossCheck, report::{AnomalySummary, CityReport}},
    model::Season,
};

pub fn performance(cmp: &PerformanceComparison, cpus: usize) -> String {
    let mut lines = vec![
        "Rolling statistics".to_string(),
        format!("  sequential: {:.3} s", cmp.sequential_secs),
        format!("  parallel:   {:.3} s ({} workers)", cmp.parallel_secs, cmp.workers),
    ];

    match (cmp.speedup(), cmp.efficiency_pct(cpus)) {
        (Some(speedup), Some(efficiency)) => {
            lines.push(format!("  speedup:    {speedup:.2}x"));
            lines.push(format!("  efficiency: {efficiency:.1}% of {cpus} CPUs"));
        }
        _ => lines.push("  speedup:    n/a".to_string()),
    }

    lines.join("\n")
}

pub fn anomalies(summary: &AnomalySummary, threshold: f64) -> String {
    format!(
        "Anomalies: {} of {} days ({:.2}%) outside ±{threshold}σ",
        summary.anomalies, summary.total, summary.percentage
    )
}

pub fn seasonal_table(city: &str, summaries: &[SeasonalSummary]) -> String {
    let mut lines = vec![
        format!("Seasonal profile for {city}"),
        format!(
            "  {:<8} {:>8} {:>8} {:>8} {:>8} {:>6}",
            "season", "mean", "std", "min", "max", "count"
        ),
    ];

    for s in summaries.iter().filter(|s| s.city == city) {
        let std = s
            .temperature_std
            .map_or_else(|| "-".to_string(), |std| format!("{std:.2}"));
        lines.push(format!(
            "  {:<8} {:>8.2} {:>8} {:>8.2} {:>8.2} {:>6}",
            s.season.as_str(),
            s.temperature_mean,
            std,
            s.temperature_min,
            s.temperature_max,
            s.count
        ));
    }

    lines.join("\n")
}

pub fn city_report(report: &CityReport) -> String {
    let o = &report.overview;
    let mut lines = vec![
        format!("Report for {}", o.city),
        format!("  records:        {}", o.records),
        format!("  period:         {} - {}", o.first.date(), o.last.date()),
        format!("  mean:           {:.1}°C", o.mean_temperature),
    ];

    if let Some(std) = o.std_temperature {
        lines.push(format!("  std:            {std:.1}°C"));
    }
    lines.push(format!("  current season: {}", o.current_season));
    lines.push(format!(
        "  anomalies:      {} ({:.1}%)",
        report.anomalies.anomalies, report.anomalies.percentage
    ));

    match &report.trend {
        Some(trend) => {
            let direction = if trend.is_rising() { "rising" } else { "falling" };
            lines.push(format!(
                "  trend:          {direction} ({:+.4}°C/step, r² = {:.3})",
                trend.slope, trend.r_squared
            ));
            let reliability = match trend.p_value {
                Some(p) if trend.is_significant() => format!("significant (p = {p:.4})"),
                Some(p) => format!("not significant (p = {p:.4})"),
                None => "unknown (too few points)".to_string(),
            };
            lines.push(format!("  reliability:    {reliability}"));
        }
        None => lines.push("  trend:          not enough data".to_string()),
    }

    if !report.anomaly_rate_by_year.is_empty() {
        lines.push("  anomalies by year:".to_string());
        for (year, rate) in &report.anomaly_rate_by_year {
            lines.push(format!("    {year}: {rate:.1}%"));
        }
    }

    if report.high_anomaly_rate() {
        lines.push(format!(
            "  warning: high anomaly rate ({:.1}%)",
            report.anomalies.percentage
        ));
    }

    lines.join("\n")
}

pub fn live(observation: &LiveObservation) -> String {
    match observation {
        LiveObservation::Success(w) => format!(
            "{}: {:.1}°C (feels like {:.1}°C), humidity {}%, pressure {} hPa, {}",
            w.city, w.temperature, w.feels_like, w.humidity, w.pressure, w.description
        ),
        LiveObservation::Failure(f) if f.is_invalid_credential() => {
            "Invalid API key. Please check the key.".to_string()
        }
        LiveObservation::Failure(f) => match f.code {
            Some(code) => format!("Error ({code}): {}", f.error),
            None => format!("Error: {}", f.error),
        },
    }
}

pub fn cross_check(check: &CrossCheck, season: Season) -> String {
    let verdict = if check.anomalous {
        "ANOMALOUS: outside the normal range"
    } else {
        "normal: within the normal range"
    };

    [
        format!("Historical {season}:"),
        format!("  mean:         {:.1}°C", check.mean),
        format!("  std:          {:.1}°C", check.std),
        format!("  normal range: {:.1}°C - {:.1}°C", check.lower, check.upper),
        format!("Current {:.1}°C is {verdict}", check.reading),
        format!("  deviation:    {:+.1}°C", check.deviation),
    ]
    .join("\n")
}
