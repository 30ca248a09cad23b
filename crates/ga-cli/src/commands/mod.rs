pub mod diff;
pub mod history;
pub mod refs;
pub mod tree;

use std::io::{self, Write};

use ga_core::{ObjectId, Rev};
use serde::Serialize;

/// Where command results go: text lines, or one JSON document per item.
pub struct Output<W: Write> {
    json: bool,
    w: W,
}

impl Output<io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(json, io::stdout())
    }
}

impl<W: Write> Output<W> {
    pub fn new(json: bool, w: W) -> Self {
        Self { json, w }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Emit one result: serialized in JSON mode, `text` otherwise.
    pub fn item<T: Serialize>(&mut self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.w, value)?;
            writeln!(self.w)?;
        } else {
            writeln!(self.w, "{}", text(value))?;
        }
        Ok(())
    }

    /// Raw text, written as-is in both modes.
    pub fn raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.w.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

/// A full hex id becomes an immutable `Rev::Oid`; anything else is a spec.
pub fn rev(arg: &str) -> Rev {
    ObjectId::from_hex(arg)
        .map(Rev::Oid)
        .unwrap_or_else(|_| Rev::from(arg))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hex_is_an_oid_everything_else_a_spec() {
        let hex = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad";
        assert!(matches!(rev(hex), Rev::Oid(_)));
        assert_eq!(rev("main~1"), Rev::Spec("main~1".into()));
        assert_eq!(rev("3b18e51"), Rev::Spec("3b18e51".into()));
    }

    #[test]
    fn output_switches_between_text_and_json() {
        let mut text = Output::new(false, Vec::new());
        text.item(&3usize, |n| format!("n={n}")).unwrap();
        assert_eq!(String::from_utf8(text.into_inner()).unwrap(), "n=3\n");

        let mut json = Output::new(true, Vec::new());
        json.item(&vec!["a", "b"], |_| unreachable!()).unwrap();
        assert_eq!(String::from_utf8(json.into_inner()).unwrap(), "[\"a\",\"b\"]\n");
    }
}
