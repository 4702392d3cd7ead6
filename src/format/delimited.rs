/// Tokenizer and renderer for delimiter-separated records, with
/// optional quoted-token mode and escape character.
#[derive(Debug, Clone)]
pub(crate) struct DelimitedCodec {
    pub delimiter: char,
    pub quote: Option<char>,
    pub escape: Option<char>,
}

impl DelimitedCodec {
    /// Splits one raw record into tokens.
    pub fn tokenize(&self, line: &str) -> std::result::Result<Vec<String>, String> {
        let mut tokens = Vec::new();
        let mut token = String::new();
        let mut chars = line.chars().peekable();

        loop {
            // quoted token, only when the quote opens the token
            if let Some(quote) = self.quote {
                if chars.peek() == Some(&quote) {
                    chars.next();
                    self.read_quoted(quote, &mut chars, &mut token)?;
                    match chars.next() {
                        None => {
                            tokens.push(std::mem::take(&mut token));
                            break;
                        }
                        Some(c) if c == self.delimiter => {
                            tokens.push(std::mem::take(&mut token));
                            continue;
                        }
                        Some(c) => {
                            return Err(format!(
                                "unexpected character '{}' after quoted field",
                                c
                            ));
                        }
                    }
                }
            }

            match chars.next() {
                None => {
                    tokens.push(token);
                    break;
                }
                Some(c) if c == self.delimiter => {
                    tokens.push(std::mem::take(&mut token));
                }
                Some(c) if Some(c) == self.escape => match chars.next() {
                    Some(escaped) => token.push(escaped),
                    None => return Err("record ends with a dangling escape".to_string()),
                },
                Some(c) => token.push(c),
            }
        }

        Ok(tokens)
    }

    fn read_quoted(
        &self,
        quote: char,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        token: &mut String,
    ) -> std::result::Result<(), String> {
        loop {
            match chars.next() {
                None => return Err("unterminated quoted field".to_string()),
                Some(c) if c == quote => {
                    // doubled quote keeps the token open
                    if chars.peek() == Some(&quote) {
                        chars.next();
                        token.push(quote);
                    } else {
                        return Ok(());
                    }
                }
                Some(c) if Some(c) == self.escape && chars.peek() == Some(&quote) => {
                    chars.next();
                    token.push(quote);
                }
                Some(c) => token.push(c),
            }
        }
    }

    /// Joins marshalled tokens back into one record. Unset positions
    /// render as empty fields.
    pub fn render(&self, slots: &[Option<String>]) -> std::result::Result<String, String> {
        let mut out = String::new();
        for (index, slot) in slots.iter().enumerate() {
            if index > 0 {
                out.push(self.delimiter);
            }
            let text = slot.as_deref().unwrap_or("");
            self.render_token(text, &mut out)?;
        }
        Ok(out)
    }

    fn render_token(&self, text: &str, out: &mut String) -> std::result::Result<(), String> {
        let needs_quoting = text.chars().any(|c| {
            c == self.delimiter || c == '\n' || c == '\r' || Some(c) == self.quote
        });
        if !needs_quoting {
            out.push_str(text);
            return Ok(());
        }

        if let Some(quote) = self.quote {
            out.push(quote);
            for c in text.chars() {
                if c == quote {
                    match self.escape {
                        Some(escape) => out.push(escape),
                        None => out.push(quote),
                    }
                }
                out.push(c);
            }
            out.push(quote);
            Ok(())
        } else if let Some(escape) = self.escape {
            for c in text.chars() {
                if c == self.delimiter || c == escape {
                    out.push(escape);
                }
                out.push(c);
            }
            Ok(())
        } else {
            Err(format!("field text '{}' contains the delimiter", text))
        }
    }
}
