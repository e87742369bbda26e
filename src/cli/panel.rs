use colored::*;

/// Border and title colour of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Blue,
    Cyan,
    Magenta,
    Yellow,
    Red,
}

impl Tone {
    fn paint(self, text: &str) -> ColoredString {
        match self {
            Tone::Green => text.green(),
            Tone::Blue => text.blue(),
            Tone::Cyan => text.cyan(),
            Tone::Magenta => text.magenta(),
            Tone::Yellow => text.yellow(),
            Tone::Red => text.red(),
        }
    }
}

/// A titled block drawn with a left border only, so no width calculation is needed
#[derive(Debug, Clone)]
pub struct Panel {
    title: String,
    tone: Tone,
    lines: Vec<String>,
}

impl Panel {
    pub fn new(title: impl Into<String>, tone: Tone) -> Self {
        Self {
            title: title.into(),
            tone,
            lines: Vec::new(),
        }
    }

    /// Append a line; embedded newlines become separate lines
    pub fn line(mut self, text: impl AsRef<str>) -> Self {
        self.push(text);
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.push(line);
        }
        self
    }

    pub fn push(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
            return;
        }
        self.lines.extend(text.lines().map(str::to_string));
    }

    pub fn render(&self) -> String {
        let bar = self.tone.paint("│");
        let mut out = String::new();
        out.push_str(&format!(
            "{} {}\n",
            self.tone.paint("╭─"),
            self.tone.paint(&self.title).bold()
        ));
        out.push_str(&format!("{}\n", bar));
        for line in &self.lines {
            if line.is_empty() {
                out.push_str(&format!("{}\n", bar));
            } else {
                out.push_str(&format!("{}  {}\n", bar, line));
            }
        }
        out.push_str(&format!("{}\n", bar));
        out.push_str(&self.tone.paint("╰─").to_string());
        out
    }
}

impl std::fmt::Display for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_render_plain() {
        colored::control::set_override(false);
        let panel = Panel::new("Title", Tone::Green).line("one\ntwo").blank().line("three");

        assert_eq!(
            panel.render(),
            "╭─ Title\n│\n│  one\n│  two\n│\n│  three\n│\n╰─"
        );
    }
}
