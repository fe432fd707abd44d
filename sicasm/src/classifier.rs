use crate::instructions::InstructionTable;
use crate::tokenizer::join_tokens;
use crate::types::{is_register, ClassifiedLine, DirectiveKind};
use log::trace;
use sicasm_common::AssemblerError;

/// Decides which tokens of a source line are label, mnemonic and operands.
pub struct LineClassifier<'a> {
    table: &'a InstructionTable,
    max_label_len: usize,
}

impl<'a> LineClassifier<'a> {
    pub fn new(table: &'a InstructionTable, max_label_len: usize) -> Self {
        Self {
            table,
            max_label_len,
        }
    }

    pub fn is_instruction(&self, token: &str) -> bool {
        self.table.contains(token)
    }

    pub fn is_directive(&self, token: &str) -> bool {
        DirectiveKind::from_str(token).is_some()
    }

    /// A label is at most `max_label_len` Latin letters, digits or
    /// underscores, starts with a letter, and is neither a register nor a
    /// known mnemonic or directive.
    pub fn is_label(&self, token: &str) -> bool {
        let mut chars = token.chars();
        let starts_with_letter = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic());

        starts_with_letter
            && token.len() <= self.max_label_len
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !is_register(&token.to_uppercase())
            && !self.is_instruction(token)
            && !self.is_directive(token)
    }

    fn is_bare_directive(token: &str) -> bool {
        matches!(
            DirectiveKind::from_str(token),
            Some(DirectiveKind::Start | DirectiveKind::End)
        )
    }

    pub fn classify(&self, tokens: &[String]) -> Result<ClassifiedLine, AssemblerError> {
        let line = match tokens {
            [mnemonic] if self.is_instruction(mnemonic) || mnemonic.eq_ignore_ascii_case("END") => {
                Some(make_line(None, mnemonic, None, None))
            }
            [label, mnemonic]
                if self.is_label(label)
                    && (self.is_instruction(mnemonic) || Self::is_bare_directive(mnemonic)) =>
            {
                Some(make_line(Some(label), mnemonic, None, None))
            }
            [mnemonic, op1] if self.is_instruction(mnemonic) || self.is_directive(mnemonic) => {
                Some(make_line(None, mnemonic, Some(op1), None))
            }
            [label, mnemonic, op1]
                if self.is_label(label)
                    && (self.is_instruction(mnemonic) || self.is_directive(mnemonic)) =>
            {
                Some(make_line(Some(label), mnemonic, Some(op1), None))
            }
            [mnemonic, op1, op2] if self.is_instruction(mnemonic) => {
                Some(make_line(None, mnemonic, Some(op1), Some(op2)))
            }
            [label, mnemonic, op1, op2]
                if self.is_label(label) && self.is_instruction(mnemonic) =>
            {
                Some(make_line(Some(label), mnemonic, Some(op1), Some(op2)))
            }
            _ => None,
        };

        let line = line.ok_or_else(|| {
            AssemblerError::malformed("Invalid instruction format", join_tokens(tokens))
        })?;
        trace!("classified {:?}", line);
        Ok(line)
    }
}

/// Split a first-pass line. The first slot holds the address (or the program
/// name on the START line) and is not validated as a label.
pub fn classify_intermediate(tokens: &[String]) -> Result<ClassifiedLine, AssemblerError> {
    match tokens {
        [slot, mnemonic] => Ok(make_line(Some(slot), mnemonic, None, None)),
        [slot, mnemonic, op1] => Ok(make_line(Some(slot), mnemonic, Some(op1), None)),
        [slot, mnemonic, op1, op2] => Ok(make_line(Some(slot), mnemonic, Some(op1), Some(op2))),
        _ => Err(AssemblerError::malformed(
            "Invalid intermediate line format",
            join_tokens(tokens),
        )),
    }
}

fn make_line(
    label: Option<&String>,
    mnemonic: &str,
    operand1: Option<&String>,
    operand2: Option<&String>,
) -> ClassifiedLine {
    ClassifiedLine {
        label: label.map(|l| l.to_uppercase()),
        mnemonic: mnemonic.to_uppercase(),
        operand1: operand1.cloned(),
        operand2: operand2.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sicasm_common::ErrorKind;

    fn toks(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn classify(line: &str) -> Result<ClassifiedLine, AssemblerError> {
        let table = InstructionTable::default();
        LineClassifier::new(&table, 10).classify(&toks(line))
    }

    #[test]
    fn test_label_rules() {
        let table = InstructionTable::default();
        let c = LineClassifier::new(&table, 10);
        assert!(c.is_label("LOOP"));
        assert!(c.is_label("a_1"));
        assert!(c.is_label("ABCDEFGHIJ"));
        assert!(!c.is_label("ABCDEFGHIJK"));
        assert!(!c.is_label("1ABC"));
        assert!(!c.is_label("_ABC"));
        assert!(!c.is_label("A-B"));
        assert!(!c.is_label("r5"));
        assert!(!c.is_label("jmp"));
        assert!(!c.is_label("Word"));
        assert!(c.is_label("R17"));
    }

    #[test]
    fn test_single_token() {
        assert_eq!(classify("end").unwrap().mnemonic, "END");
        assert_eq!(classify("jmp").unwrap().mnemonic, "JMP");
        assert_eq!(classify("LOOP").unwrap_err().kind(), ErrorKind::MalformedLine);
        assert_eq!(classify("WORD").unwrap_err().kind(), ErrorKind::MalformedLine);
    }

    #[test]
    fn test_two_tokens() {
        let line = classify("prog start").unwrap();
        assert_eq!(line.label.as_deref(), Some("PROG"));
        assert_eq!(line.mnemonic, "START");
        assert_eq!(line.operand_count(), 0);

        let line = classify("word 5").unwrap();
        assert_eq!(line.label, None);
        assert_eq!(line.mnemonic, "WORD");
        assert_eq!(line.operand1.as_deref(), Some("5"));

        let line = classify("JMP loop").unwrap();
        assert_eq!(line.mnemonic, "JMP");
        assert_eq!(line.operand1.as_deref(), Some("loop"));

        assert!(classify("LOOP WHAT").is_err());
    }

    #[test]
    fn test_three_tokens() {
        let line = classify("prog START 256").unwrap();
        assert_eq!(line.label.as_deref(), Some("PROG"));
        assert_eq!(line.operand1.as_deref(), Some("256"));

        let line = classify("ADD R1 R2").unwrap();
        assert_eq!(line.label, None);
        assert_eq!(line.operand1.as_deref(), Some("R1"));
        assert_eq!(line.operand2.as_deref(), Some("R2"));

        // two-operand form needs an instruction, not a directive
        assert!(classify("WORD 1 2").is_err());
    }

    #[test]
    fn test_four_tokens() {
        let line = classify("l1 add R1 R2").unwrap();
        assert_eq!(line.label.as_deref(), Some("L1"));
        assert_eq!(line.mnemonic, "ADD");
        assert_eq!(line.operand_count(), 2);

        assert!(classify("L1 BYTE 1 2").is_err());
        assert!(classify("L1 ADD R1 R2 R3").is_err());
    }

    #[test]
    fn test_intermediate_lines() {
        let line = classify_intermediate(&toks("000103 05 l1")).unwrap();
        assert_eq!(line.label.as_deref(), Some("000103"));
        assert_eq!(line.mnemonic, "05");
        assert_eq!(line.operand1.as_deref(), Some("l1"));

        let line = classify_intermediate(&toks("prog START 000100")).unwrap();
        assert_eq!(line.label.as_deref(), Some("PROG"));

        assert!(classify_intermediate(&toks("000100")).is_err());
    }
}
