//! Table formatting and output utilities
//!
//! This module provides functionality for formatting and displaying
//! tabular data with color support, and for rendering program documents.

use crossterm::style::{Color as CrosstermColor, Stylize};
use crossterm::terminal::size;
use tabled::{
    settings::{object::Rows, Alignment, Color, Modify, Padding, Style, Width},
    Table, Tabled,
};

use crate::engine::models::Program;
use crate::error::{ProvisionError, Result};

/// Program document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgramFormat {
    Yaml,
    Json,
}

/// Render a program document
pub fn render_program(program: &Program, format: ProgramFormat) -> Result<String> {
    match format {
        ProgramFormat::Yaml => {
            serde_yaml::to_string(program).map_err(|e| ProvisionError::serialization(e.to_string()))
        }
        ProgramFormat::Json => Ok(serde_json::to_string_pretty(program)? + "\n"),
    }
}

/// Color theme for console output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub header: CrosstermColor,
    pub success: CrosstermColor,
    pub warning: CrosstermColor,
    pub info: CrosstermColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            header: CrosstermColor::Blue,
            success: CrosstermColor::Green,
            warning: CrosstermColor::Yellow,
            info: CrosstermColor::Cyan,
        }
    }
}

/// Table formatter with color support
pub struct TableFormatter {
    no_color: bool,
}

impl TableFormatter {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    /// Create a formatted table from data
    pub fn format_table<T: Tabled>(&self, data: &[T]) -> String {
        if data.is_empty() {
            return "No data to display".to_string();
        }

        let mut table = Table::new(data);
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .with(Padding::new(1, 1, 0, 0));

        if !self.no_color {
            table.with(Modify::new(Rows::first()).with(Color::FG_BLUE));
        }

        // Auto-adjust width to terminal
        if let Ok((width, _)) = size() {
            table.with(Width::wrap(width as usize));
        }

        table.to_string()
    }
}

/// Display utilities for status messages
pub struct DisplayUtils {
    theme: ColorTheme,
    no_color: bool,
}

impl DisplayUtils {
    pub fn new(no_color: bool) -> Self {
        Self {
            theme: ColorTheme::default(),
            no_color,
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.no_color {
            println!("=== {} ===", title);
        } else {
            println!("=== {} ===", title.with(self.theme.header).bold());
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.no_color {
            println!("✓ {}", message);
        } else {
            println!("✓ {}", message.with(self.theme.success));
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.no_color {
            println!("⚠ {}", message);
        } else {
            println!("⚠ {}", message.with(self.theme.warning));
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.no_color {
            println!("ℹ {}", message);
        } else {
            println!("ℹ {}", message.with(self.theme.info));
        }
    }

    /// Format key-value pairs
    pub fn format_key_value_pairs(&self, pairs: &[(&str, String)]) -> String {
        let max_key_length = pairs.iter().map(|(key, _)| key.len()).max().unwrap_or(0);

        pairs
            .iter()
            .map(|(key, value)| {
                let padded = format!("{:width$}", key, width = max_key_length);
                if self.no_color {
                    format!("{}: {}", padded, value)
                } else {
                    format!("{}: {}", padded.with(self.theme.info).bold(), value)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
