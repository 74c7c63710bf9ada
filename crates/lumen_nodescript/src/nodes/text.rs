// SPDX-License-Identifier: MIT OR Apache-2.0
//! Text formatting node.

use crate::evaluation::EvaluationError;
use crate::node::NodeBehavior;
use crate::pin::{CollectionId, PinDirection, PinId, PinSet};
use crate::value::{Value, ValueType};

/// Substitute positional arguments into a format string.
///
/// `{n}` inserts argument `n`; `{{` and `}}` are literal braces. Anything
/// after a `:` inside a placeholder is ignored.
pub fn format_positional(format: &str, arguments: &[&Value]) -> Result<String, EvaluationError> {
    let mut result = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                result.push('{');
            }
            '{' => {
                let mut placeholder = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => placeholder.push(c),
                        None => {
                            return Err(EvaluationError::Format(format!(
                                "unterminated placeholder '{{{placeholder}'"
                            )))
                        }
                    }
                }
                let index_text = placeholder.split(':').next().unwrap_or_default().trim();
                let index: usize = index_text.parse().map_err(|_| {
                    EvaluationError::Format(format!("'{index_text}' is not an argument index"))
                })?;
                let argument = arguments.get(index).ok_or_else(|| {
                    EvaluationError::Format(format!(
                        "argument {index} requested but only {} given",
                        arguments.len()
                    ))
                })?;
                result.push_str(&argument.to_string());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                result.push('}');
            }
            '}' => return Err(EvaluationError::Format("unmatched '}'".to_string())),
            c => result.push(c),
        }
    }

    Ok(result)
}

/// Formats its argument collection into a string
pub struct FormatNode {
    format: PinId,
    arguments: CollectionId,
    output: PinId,
}

impl NodeBehavior for FormatNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let arguments: Vec<&Value> = pins.collection_values(self.arguments).collect();
        let format = pins.value(self.format).as_text().unwrap_or_default();
        let result = format_positional(format, &arguments)?;
        pins.set_value(self.output, result);
        Ok(())
    }
}

/// Construct a format node
pub fn format(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let format = pins.create_input(ValueType::Text, "Format");
    let arguments = pins.create_collection(PinDirection::Input, Some(ValueType::Any), "Argument", 0, 1);
    let output = pins.create_output(ValueType::Text, "Result");
    Box::new(FormatNode {
        format,
        arguments,
        output,
    })
}
