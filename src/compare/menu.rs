//! Numeric start menu.

use crate::compare::{Console, read_line};
use crate::models::Result;
use std::io::{BufRead, Write};

/// Entry chosen from the start menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// 1. Run predefined comparison tests
    Compare,
    /// 2. Interactive mode
    Interactive,
    /// 3. Exit
    Exit,
}

impl MenuChoice {
    /// Parse a menu entry; anything but 1–3 is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Compare),
            "2" => Some(Self::Interactive),
            "3" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Print the menu under `title` and read a choice.
///
/// `None` for invalid input or end of input.
pub fn read_menu_choice<R: BufRead, W: Write>(
    title: &str,
    input: &mut R,
    console: &mut Console<W>,
) -> Result<Option<MenuChoice>> {
    console.blank()?;
    console.line(format_args!("{title} Comparison Tool"))?;
    console.separator('=')?;
    console.blank()?;
    console.line("Options:")?;
    console.line("1. Run predefined comparison tests")?;
    console.line("2. Interactive mode (custom prompts)")?;
    console.line("3. Exit")?;
    console.blank()?;
    console.prompt("Enter choice (1-3): ")?;

    Ok(read_line(input)?.as_deref().and_then(MenuChoice::parse))
}
