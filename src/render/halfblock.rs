use super::bitmap::Bitmap;
use crossterm::style::Color;

/// Color output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// No color, block shapes only
    Mono,
    /// ANSI 16 colors
    Ansi16,
    /// 256-color palette
    Ansi256,
    /// 24-bit true color (RGB)
    TrueColor,
}

pub fn map_color(mode: ColorMode, r: u8, g: u8, b: u8) -> Color {
    match mode {
        ColorMode::Mono => Color::White,
        ColorMode::TrueColor => Color::Rgb { r, g, b },
        ColorMode::Ansi256 => {
            // Approximate RGB to 256-color
            let idx = 16 + (36 * (r as u16 / 51)) + (6 * (g as u16 / 51)) + (b as u16 / 51);
            Color::AnsiValue(idx as u8)
        }
        ColorMode::Ansi16 => {
            let brightness = (r as u16 + g as u16 + b as u16) / 3;
            if brightness < 64 {
                Color::Black
            } else if r > g && r > b {
                if brightness > 180 { Color::Red } else { Color::DarkRed }
            } else if g > r && g > b {
                if brightness > 180 { Color::Green } else { Color::DarkGreen }
            } else if b > r && b > g {
                if brightness > 180 { Color::Blue } else { Color::DarkBlue }
            } else if brightness > 180 {
                Color::White
            } else {
                Color::Grey
            }
        }
    }
}

fn color_to_fg(color: Color) -> String {
    match color {
        Color::Rgb { r, g, b } => format!("38;2;{};{};{}", r, g, b),
        Color::AnsiValue(v) => format!("38;5;{}", v),
        Color::Black => "30".into(),
        Color::DarkRed => "31".into(),
        Color::DarkGreen => "32".into(),
        Color::DarkBlue => "34".into(),
        Color::Grey => "37".into(),
        Color::Red => "91".into(),
        Color::Green => "92".into(),
        Color::Blue => "94".into(),
        Color::White => "97".into(),
        _ => "37".into(),
    }
}

fn color_to_bg(color: Color) -> String {
    match color {
        Color::Rgb { r, g, b } => format!("48;2;{};{};{}", r, g, b),
        Color::AnsiValue(v) => format!("48;5;{}", v),
        Color::Black => "40".into(),
        Color::DarkRed => "41".into(),
        Color::DarkGreen => "42".into(),
        Color::DarkBlue => "44".into(),
        Color::Grey => "47".into(),
        Color::Red => "101".into(),
        Color::Green => "102".into(),
        Color::Blue => "104".into(),
        Color::White => "107".into(),
        _ => "40".into(),
    }
}

/// Alpha below which a pixel counts as empty background.
const EMPTY_ALPHA: u8 = 8;

/// Render a frame as half-block characters, two pixel rows per terminal row.
pub fn render(frame: &Bitmap, mode: ColorMode) -> String {
    let term_cols = frame.width();
    let term_rows = frame.height() / 2;
    let mut out = String::with_capacity(term_cols * term_rows * 10);

    let mut last_fg = String::new();
    let mut last_bg = String::new();
    let mut in_color = false;

    for row in 0..term_rows {
        for col in 0..term_cols {
            let top = frame.get(col, row * 2).unwrap_or_default();
            let bot = frame.get(col, row * 2 + 1).unwrap_or_default();

            let top_empty = top.a < EMPTY_ALPHA;
            let bot_empty = bot.a < EMPTY_ALPHA;

            if mode == ColorMode::Mono {
                match (!top_empty, !bot_empty) {
                    (true, true) => out.push('█'),
                    (true, false) => out.push('▀'),
                    (false, true) => out.push('▄'),
                    (false, false) => out.push(' '),
                }
            } else if top_empty && bot_empty {
                if in_color {
                    out.push_str("\x1b[0m");
                    in_color = false;
                    last_fg.clear();
                    last_bg.clear();
                }
                out.push(' ');
            } else {
                // Premultiply so translucent pixels fade toward the black background
                let scale = |c: u8, a: u8| -> u8 { (c as u16 * a as u16 / 255) as u8 };
                let fg = color_to_fg(map_color(
                    mode,
                    scale(top.r, top.a),
                    scale(top.g, top.a),
                    scale(top.b, top.a),
                ));
                let bg = color_to_bg(map_color(
                    mode,
                    scale(bot.r, bot.a),
                    scale(bot.g, bot.a),
                    scale(bot.b, bot.a),
                ));

                let fg_changed = fg != last_fg;
                let bg_changed = bg != last_bg;

                if fg_changed && bg_changed {
                    out.push_str("\x1b[");
                    out.push_str(&fg);
                    out.push(';');
                    out.push_str(&bg);
                    out.push('m');
                } else if fg_changed {
                    out.push_str("\x1b[");
                    out.push_str(&fg);
                    out.push('m');
                } else if bg_changed {
                    out.push_str("\x1b[");
                    out.push_str(&bg);
                    out.push('m');
                }

                if fg_changed {
                    last_fg = fg;
                }
                if bg_changed {
                    last_bg = bg;
                }
                in_color = true;

                out.push('▀');
            }
        }
        if in_color {
            out.push_str("\x1b[0m");
            in_color = false;
            last_fg.clear();
            last_bg.clear();
        }
        out.push_str("\x1b[");
        out.push_str(&(row + 2).to_string());
        out.push_str(";1H");
    }
    out
}
