use std::io::{self, BufRead, Write};

/// Asks questions on `output` and reads the answers from `input`, one per
/// line.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    fn read_answer(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks for a value. An empty answer takes `default`; without a default
    /// the question is repeated.
    pub fn ask(&mut self, label: &str, default: Option<&str>) -> io::Result<String> {
        loop {
            match default {
                Some(default) => write!(self.output, "{} [{}]: ", label, default)?,
                None => write!(self.output, "{}: ", label)?,
            }
            self.output.flush()?;

            let answer = self.read_answer()?;
            match (answer, default) {
                (Some(answer), _) if !answer.is_empty() => return Ok(answer),
                (_, Some(default)) => return Ok(default.to_string()),
                (Some(_), None) => continue,
                (None, None) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("no answer for {}", label),
                    ))
                }
            }
        }
    }

    /// Asks a yes/no question.
    pub fn confirm(&mut self, label: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "{} [{}]: ", label, hint)?;
            self.output.flush()?;
            let answer = match self.read_answer()? {
                Some(answer) => answer.to_lowercase(),
                None => return Ok(default),
            };
            match answer.as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    /// Prints a line of guidance between questions.
    pub fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }
}
