//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Local, Utc};
use tallybar_core::{AnalyticsSnapshot, Token, TokenGroups, TenantInfo, quota_to_currency};

use super::{RefreshRow, TenantRow};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

// Sparkline levels, lowest first
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

const TOP_ROWS: usize = 10;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
    spark_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
            spark_width: 48,
        }
    }

    // ========================================================================
    // Tenants
    // ========================================================================

    /// Formats the tenant list with balances.
    pub fn format_tenants(&self, rows: &[TenantRow]) -> String {
        if rows.is_empty() {
            return self.dim("No tenants configured. Add one with `tallybar tenants add`.");
        }

        let mut lines = Vec::new();
        lines.push(self.bold("Tenants"));
        lines.push("─".repeat(60));

        for row in rows {
            let marker = if row.selected { self.cyan("●") } else { " ".to_string() };
            let platform = row.tenant.platform().cli_name();
            let head = format!("{marker} {:<18} {:<9}", truncate(&row.tenant.name, 18), platform);

            let Some(balance) = row.balance else {
                lines.push(format!("{head} {}", self.dim("no data")));
                continue;
            };

            let symbol = row.info.currency_symbol();
            let remaining = quota_to_currency(balance.remaining_credit, row.info.credit_unit);
            let total = balance.total_credit();
            let percent_left = if total > 0.0 {
                balance.remaining_credit / total * 100.0
            } else {
                0.0
            };

            let mut line = format!(
                "{head} {:>12} {}",
                format!("{symbol}{remaining:.2}"),
                self.progress_bar(percent_left)
            );
            if let Some(updated_at) = row.updated_at {
                line.push_str(&format!(" {}", self.dim(&format_age(updated_at))));
            }
            lines.push(line);
        }

        lines.join("\n")
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Formats one tenant's refresh outcome.
    pub fn format_refresh(&self, row: &RefreshRow) -> String {
        let mut lines = vec![self.bold(&row.tenant_name)];
        let symbol = row.info.currency_symbol();
        let unit = row.info.credit_unit;

        if let Some(balance) = row.balance {
            lines.push(format!(
                "Balance:  {} left, {} used",
                self.green(&format!(
                    "{symbol}{:.2}",
                    quota_to_currency(balance.remaining_credit, unit)
                )),
                format!("{symbol}{:.2}", quota_to_currency(balance.consumed_credit, unit)),
            ));
        }
        if let Some(usage) = row.today_usage {
            lines.push(format!("Today:    {symbol}{:.2}", quota_to_currency(usage, unit)));
        }
        for (domain, message) in &row.errors {
            lines.push(format!("{} {domain}: {message}", self.red("✗")));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    /// Formats an analytics snapshot.
    pub fn format_analytics(
        &self,
        tenant_name: &str,
        snapshot: &AnalyticsSnapshot,
        info: &TenantInfo,
    ) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "{} {}",
            self.bold(&format!("{tenant_name} Usage Analytics")),
            self.dim(&format!("({})", snapshot.period))
        ));
        lines.push("─".repeat(50));

        if snapshot.is_empty() {
            lines.push(self.dim("No usage in this period"));
            return lines.join("\n");
        }

        let money = |quota: f64| {
            format!("{}{:.2}", info.currency_symbol(), quota_to_currency(quota, info.credit_unit))
        };
        let summary = &snapshot.summary;

        lines.push(format!("Total cost:   {}", self.green(&money(summary.total_cost))));
        lines.push(format!("Requests:     {}", self.format_number(summary.total_requests as f64)));
        lines.push(format!("Tokens:       {}", self.format_number(summary.total_tokens as f64)));
        lines.push(format!("Per request:  {}", money(summary.average_cost_per_request())));
        lines.push(format!(
            "Balance:      {} left, {} used",
            money(summary.remaining_credit),
            money(summary.consumed_credit)
        ));

        if !snapshot.series.is_empty() {
            let costs: Vec<f64> = snapshot.series.iter().map(|p| p.cost).collect();
            lines.push(String::new());
            lines.push(self.dim("Activity:"));
            lines.push(format!("  {}", self.sparkline(&costs)));
            if let (Some(first), Some(last)) = (snapshot.series.first(), snapshot.series.last()) {
                lines.push(format!(
                    "  {} → {}",
                    self.dim(&format_timestamp(first.timestamp)),
                    self.dim(&format_timestamp(last.timestamp))
                ));
            }
        }

        if !snapshot.models.is_empty() {
            lines.push(String::new());
            lines.push(self.dim(&format!("Models ({}):", summary.model_count)));
            for model in snapshot.models.iter().take(TOP_ROWS) {
                lines.push(format!(
                    "  {:<28} {:>10} {:>6.1}% {:>8} req",
                    truncate(&model.model_id, 28),
                    money(model.cost),
                    model.share * 100.0,
                    self.format_number(model.requests as f64)
                ));
            }
        }

        if !snapshot.endpoints.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Endpoints:"));
            for endpoint in snapshot.endpoints.iter().take(TOP_ROWS) {
                lines.push(format!(
                    "  {:<28} {:>10} {:>6.1}%",
                    truncate(&endpoint.endpoint, 28),
                    money(endpoint.cost),
                    endpoint.share * 100.0
                ));
            }
        }

        lines.join("\n")
    }

    /// Renders values as a one-line sparkline, scaled to the maximum.
    pub fn sparkline(&self, values: &[f64]) -> String {
        if values.is_empty() {
            return String::new();
        }

        // Average adjacent values down to the line width
        let width = self.spark_width.min(values.len());
        let columns: Vec<f64> = (0..width)
            .map(|i| {
                let start = i * values.len() / width;
                let end = ((i + 1) * values.len() / width).max(start + 1);
                values[start..end].iter().sum::<f64>() / (end - start) as f64
            })
            .collect();

        let max = columns.iter().copied().fold(0.0_f64, f64::max);
        columns
            .iter()
            .map(|v| {
                if max <= 0.0 || *v <= 0.0 {
                    SPARKS[0]
                } else {
                    let level = (v / max * (SPARKS.len() - 1) as f64).round() as usize;
                    SPARKS[level.min(SPARKS.len() - 1)]
                }
            })
            .collect()
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Formats API tokens with their groups.
    pub fn format_tokens(&self, tokens: &[Token], groups: &TokenGroups, info: &TenantInfo) -> String {
        if tokens.is_empty() {
            return self.dim("No tokens");
        }

        let mut lines = Vec::new();
        lines.push(format!(
            "{:<20} {:<14} {:<12} {:>10} {}",
            self.bold("Label"),
            self.bold("Key"),
            self.bold("Group"),
            self.bold("Used"),
            self.bold("Last used")
        ));

        for token in tokens {
            let group = match groups.get(&token.group) {
                Some(g) if (g.multiplier - 1.0).abs() > f64::EPSILON => {
                    format!("{} ×{}", token.group, g.multiplier)
                }
                _ if token.group.is_empty() => "default".to_string(),
                _ => token.group.clone(),
            };
            let used = format!(
                "{}{:.2}",
                info.currency_symbol(),
                quota_to_currency(token.credit_consumed, info.credit_unit)
            );
            let last_used = token
                .last_used_at
                .map_or_else(|| self.dim("never"), format_timestamp);

            lines.push(format!(
                "{:<20} {:<14} {:<12} {:>10} {}",
                truncate(&token.label, 20),
                token.masked_key(),
                truncate(&group, 12),
                used,
                last_used
            ));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Misc
    // ========================================================================

    /// Formats the badge preview.
    pub fn format_badge(&self, text: Option<&str>) -> String {
        match text {
            Some(text) => format!("Badge: {}", self.bold(text)),
            None => format!("Badge: {}", self.dim("(hidden)")),
        }
    }

    /// Formats an error message.
    pub fn format_error(&self, tenant: &str, error: &str) -> String {
        format!("{}: {} - {}", self.bold(tenant), self.red("Error"), error)
    }

    /// Formats a progress bar.
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let ratio = (percent_remaining / 100.0).clamp(0.0, 1.0);
        let filled = (ratio * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn format_number(&self, n: f64) -> String {
        if n >= 1_000_000.0 {
            format!("{:.1}M", n / 1_000_000.0)
        } else if n >= 1_000.0 {
            format!("{:.1}K", n / 1_000.0)
        } else {
            format!("{n:.0}")
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Cuts `text` to `max` characters, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Formats a unix timestamp in local time.
fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0).map_or_else(
        || ts.to_string(),
        |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Formats how long ago `at` was.
fn format_age(at: DateTime<Utc>) -> String {
    let age = Utc::now() - at;
    if age.num_minutes() < 1 {
        "just now".to_string()
    } else if age.num_hours() < 1 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_days() < 1 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}

// ============================================================================
// Tests
// ============================================================================
