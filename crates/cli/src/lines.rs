//! Lifecycle lines read by `menubridge follow`.
//!
//! ```text
//! create 0x3c00007 /com/example/App/MenuBar/1
//! create 62914567
//! destroy 0x3c00007
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use menubridge::{MenuObjectPath, WindowHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
	Create { window: WindowHandle, menu_path: Option<MenuObjectPath> },
	Destroy { window: WindowHandle },
}

/// Parses one line. `Ok(None)` means nothing to do.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Line>> {
	let line = line.trim();
	if line.is_empty() || line.starts_with('#') {
		return Ok(None);
	}

	let mut words = line.split_whitespace();
	let verb = words.next().unwrap_or_default();
	let Some(id) = words.next() else {
		anyhow::bail!("`{verb}` needs a window id");
	};
	let window = parse_window_id(id)?;

	let parsed = match verb {
		"create" => Line::Create {
			window,
			menu_path: words.next().map(MenuObjectPath::new).transpose()?,
		},
		"destroy" => Line::Destroy { window },
		other => anyhow::bail!("unknown command `{other}`"),
	};
	if let Some(extra) = words.next() {
		anyhow::bail!("unexpected `{extra}` after `{verb} {id}`");
	}
	Ok(Some(parsed))
}

/// Accepts decimal or `0x`-prefixed hex, as printed by `xprop` and `xwininfo`.
pub fn parse_window_id(raw: &str) -> anyhow::Result<WindowHandle> {
	let id = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
		Some(hex) => u32::from_str_radix(hex, 16),
		None => raw.parse(),
	}
	.map_err(|err| anyhow::anyhow!("invalid window id `{raw}`: {err}"))?;
	Ok(WindowHandle::new(id))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn window_ids_accept_hex_and_decimal() {
		assert_eq!(parse_window_id("0x3c00007").unwrap(), WindowHandle::new(0x03c0_0007));
		assert_eq!(parse_window_id("62914567").unwrap(), WindowHandle::new(62_914_567));
		assert!(parse_window_id("window").is_err());
		assert!(parse_window_id("0x1_0000_0000").is_err());
	}

	#[test]
	fn create_with_and_without_path() {
		assert_eq!(
			parse_line("create 7 /app/menu").unwrap(),
			Some(Line::Create {
				window: WindowHandle::new(7),
				menu_path: Some(MenuObjectPath::new("/app/menu").unwrap()),
			})
		);
		assert_eq!(
			parse_line("  create 0x10  ").unwrap(),
			Some(Line::Create {
				window: WindowHandle::new(16),
				menu_path: None,
			})
		);
	}

	#[test]
	fn destroy_line() {
		assert_eq!(
			parse_line("destroy 9").unwrap(),
			Some(Line::Destroy {
				window: WindowHandle::new(9)
			})
		);
	}

	#[test]
	fn comments_and_blanks_are_skipped() {
		assert_eq!(parse_line("").unwrap(), None);
		assert_eq!(parse_line("   # note").unwrap(), None);
	}

	#[test]
	fn malformed_lines_are_errors() {
		assert!(parse_line("create").is_err());
		assert!(parse_line("resize 4").is_err());
		assert!(parse_line("create 4 menu").is_err(), "relative paths are not object paths");
		assert!(parse_line("destroy 4 /app/menu").is_err());
	}
}
