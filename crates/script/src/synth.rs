//! Code synthesis: formula body plus resolved dependencies, out comes the
//! source of one callable function.

use ripple_core::Value;

/// One resolved dependency: the name the formula reads it by and the value
/// its worker last published.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Dependency name, bound as a local in the synthesized function.
    pub name: String,
    /// The dependency's last published value.
    pub value: Value,
}

impl Binding {
    /// Create a binding.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Synthesize the source of a function wrapping `code`.
///
/// The function is always named `run` and takes one positional argument
/// sequence; each dependency becomes a `let` binding of the matching
/// positional slot, in declaration order, followed by the body verbatim.
/// Dependency values travel alongside the call as tagged variants, so the
/// bindings carry no type annotations. Deterministic given its inputs.
pub fn synthesize(code: &str, bindings: &[Binding]) -> String {
    let mut source = String::from("fn run(args) {\n");
    for (index, binding) in bindings.iter().enumerate() {
        source.push_str(&format!("    let {} = args[{}];\n", binding.name, index));
    }
    for line in code.lines() {
        source.push_str("    ");
        source.push_str(line);
        source.push('\n');
    }
    source.push('}');
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dependencies() {
        let source = synthesize("return 2+2", &[]);
        assert_eq!(source, "fn run(args) {\n    return 2+2\n}");
    }

    #[test]
    fn bindings_in_order() {
        let bindings = vec![
            Binding::new("A", Value::Int(10)),
            Binding::new("B", Value::Float64(2.5)),
        ];
        let source = synthesize("return A * B", &bindings);
        assert_eq!(
            source,
            "fn run(args) {\n    let A = args[0];\n    let B = args[1];\n    return A * B\n}"
        );
    }

    #[test]
    fn multiline_body() {
        let source = synthesize("let x = 1\nreturn x", &[]);
        assert_eq!(source, "fn run(args) {\n    let x = 1\n    return x\n}");
    }

    #[test]
    fn deterministic() {
        let bindings = vec![Binding::new("A", Value::Null)];
        assert_eq!(
            synthesize("return A", &bindings),
            synthesize("return A", &bindings)
        );
    }
}
