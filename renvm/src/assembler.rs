//! Text assembler for programs.
//!
//! # Syntax
//!
//! ```text
//! # comment
//! fn main 1
//!     int r0 2            # r<N> is a reference, c<N> a constant
//!     int r1 3
//!     binop r2 r0 + r1
//!     return r2
//! end
//! ```
//!
//! - Functions are numbered in order of appearance; the first one is the entry point
//! - A line ending in `:` defines a label local to the enclosing function
//! - Jump targets are labels or absolute instruction indices
//! - Functions are referenced as `@name` or `@index`
//! - Strings are double-quoted, chars single-quoted; both accept `\n \t \\ \" \'`
//! - Commas between operands are optional

use crate::interpreter::operator::{Fixity, OperatorKey, Symbol};
use crate::program::{CatchClause, ConstId, Function, FunctionId, Instruction, Program, RefId};
use crate::ty::CatchType;
use crate::value::RefList;
use anyhow::{Context, Result, anyhow, bail};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';
const MNEMONICS: &[&str] = &[
    "int", "float", "char", "bool", "string", "array", "tuple", "struct", "func", "copy",
    "param", "field", "element", "index", "set_field", "set_index", "apply", "call", "binop",
    "prefix", "postfix", "load_const", "set_const", "read_error", "bind", "resolve",
    "push_scope", "push_loop", "push_try", "pop", "jump", "br_true", "br_false", "const_br",
    "nop", "return", "throw", "break", "continue",
];

/// Reads and assembles the program in `path`.
pub fn assemble_file(path: &Path) -> Result<Program> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program file {}", path.display()))?;
    assemble(&source).with_context(|| format!("Failed to assemble {}", path.display()))
}

/// Assembles program text.
pub fn assemble(source: &str) -> Result<Program> {
    let sources = split_functions(source)?;
    let names: HashMap<&str, FunctionId> = sources
        .iter()
        .enumerate()
        .map(|(id, f)| (f.name.as_str(), id))
        .collect();

    let mut functions = Vec::with_capacity(sources.len());
    for source in &sources {
        let ctx = AsmContext {
            functions: &names,
            labels: &source.labels,
        };
        let mut instructions = Vec::with_capacity(source.lines.len());
        for line in &source.lines {
            let instruction = parse_instruction(&ctx, &line.tokens)
                .with_context(|| format!("line {}", line.number))?;
            instructions.push(instruction);
        }
        functions.push(Function::new(source.name.clone(), source.params, instructions));
    }
    debug!("Assembled {} functions", functions.len());
    Ok(Program::new(functions))
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    /// Whether the text came from a quoted literal.
    quote: Option<char>,
}

impl Token {
    fn bare(&self) -> Result<&str> {
        match self.quote {
            None => Ok(&self.text),
            Some(_) => bail!("Unexpected literal `{}`", self.text),
        }
    }
}

struct Line {
    number: usize,
    tokens: Vec<Token>,
}

struct FunctionSource {
    name: String,
    params: usize,
    lines: Vec<Line>,
    labels: HashMap<String, usize>,
}

/// Names visible while parsing one function body.
struct AsmContext<'a> {
    functions: &'a HashMap<&'a str, FunctionId>,
    labels: &'a HashMap<String, usize>,
}

impl AsmContext<'_> {
    fn target(&self, token: &Token) -> Result<usize> {
        let text = token.bare()?;
        if let Ok(index) = text.parse::<usize>() {
            return Ok(index);
        }
        self.labels
            .get(text)
            .copied()
            .ok_or_else(|| anyhow!("Undefined label `{}`", text))
    }

    fn function(&self, token: &Token) -> Result<FunctionId> {
        let text = token.bare()?;
        let name = text
            .strip_prefix('@')
            .ok_or_else(|| anyhow!("Expected a function like `@name`, found `{}`", text))?;
        if let Ok(id) = name.parse::<FunctionId>() {
            return Ok(id);
        }
        self.functions
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("Undefined function `{}`", name))
    }
}

/// Groups lines into function bodies and assigns label positions.
fn split_functions(source: &str) -> Result<Vec<FunctionSource>> {
    let mut functions: Vec<FunctionSource> = Vec::new();
    let mut current: Option<FunctionSource> = None;

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let tokens = tokenize(raw).with_context(|| format!("line {}", number))?;
        let head = match tokens.first() {
            None => continue,
            Some(token) if token.quote.is_none() => token.text.clone(),
            Some(_) => String::new(),
        };

        if head == "fn" {
            if let Some(open) = &current {
                bail!("line {}: function `{}` is missing `end`", number, open.name);
            }
            let [_, name, params] = tokens.as_slice() else {
                bail!("line {}: expected `fn <name> <param-count>`", number);
            };
            let params = params.bare()?.parse::<usize>().map_err(|_| {
                anyhow!("line {}: invalid parameter count `{}`", number, params.text)
            })?;
            let name = name.bare()?.to_string();
            if functions.iter().any(|f| f.name == name) {
                bail!("line {}: function `{}` defined twice", number, name);
            }
            current = Some(FunctionSource {
                name,
                params,
                lines: Vec::new(),
                labels: HashMap::new(),
            });
            continue;
        }

        let Some(function) = current.as_mut() else {
            bail!("line {}: instruction outside of a function", number);
        };
        if head == "end" && tokens.len() == 1 {
            functions.extend(current.take());
        } else if is_label_def(&head) && tokens.len() == 1 {
            let label = &head[..head.len() - 1];
            let position = function.lines.len();
            if function.labels.insert(label.to_string(), position).is_some() {
                bail!("line {}: label `{}` defined twice", number, label);
            }
        } else {
            function.lines.push(Line { number, tokens });
        }
    }

    if let Some(open) = current {
        bail!("function `{}` is missing `end`", open.name);
    }
    if functions.is_empty() {
        bail!("program defines no functions");
    }
    Ok(functions)
}

fn is_label_def(text: &str) -> bool {
    text.ends_with(LABEL_SUFFIX) && text.len() > 1
}

/// Splits one line into tokens.
///
/// Whitespace and commas separate tokens; `#` outside a literal starts a comment.
fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            COMMENT_CHAR => break,
            ',' => {
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        None => {
                            let what = if c == '"' { "string" } else { "char" };
                            bail!("unterminated {} literal", what)
                        }
                        Some(end) if end == c => break,
                        Some('\\') => text.push(unescape(chars.next())?),
                        Some(other) => text.push(other),
                    }
                }
                out.push(Token {
                    text,
                    quote: Some(c),
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == ',' || c == COMMENT_CHAR {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                out.push(Token { text, quote: None });
            }
        }
    }
    Ok(out)
}

fn unescape(c: Option<char>) -> Result<char> {
    match c {
        Some('n') => Ok('\n'),
        Some('t') => Ok('\t'),
        Some('0') => Ok('\0'),
        Some(c @ ('\\' | '"' | '\'')) => Ok(c),
        Some(c) => bail!("unknown escape `\\{}`", c),
        None => bail!("escape at end of line"),
    }
}

/// Parse a reference token like `r0`, `r15`.
fn parse_ref(token: &Token) -> Result<RefId> {
    let text = token.bare()?;
    text.strip_prefix('r')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| anyhow!("Expected a reference like `r0`, found `{}`", text))
}

/// Parse a constant token like `c0`.
fn parse_const(token: &Token) -> Result<ConstId> {
    let text = token.bare()?;
    text.strip_prefix('c')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| anyhow!("Expected a constant like `c0`, found `{}`", text))
}

fn parse_usize(token: &Token) -> Result<usize> {
    let text = token.bare()?;
    text.parse()
        .map_err(|_| anyhow!("Expected a non-negative integer, found `{}`", text))
}

fn parse_refs(tokens: &[Token]) -> Result<RefList> {
    tokens.iter().map(parse_ref).collect()
}

fn parse_operator(token: &Token, fixity: Fixity) -> Result<OperatorKey> {
    let symbol: Symbol = token.bare()?.parse()?;
    Ok(OperatorKey::new(symbol, fixity))
}

/// Parses `catch <type> <label>` clauses followed by an optional
/// `finally <start> <end>` range.
fn parse_try(ctx: &AsmContext, mut tokens: &[Token]) -> Result<Instruction> {
    let mut catches = Vec::new();
    let mut finally = None;
    while let Some(first) = tokens.first() {
        match (first.bare()?, &tokens[1..]) {
            ("catch", [ty, handler, rest @ ..]) => {
                catches.push(CatchClause {
                    ty: ty.bare()?.parse::<CatchType>()?,
                    handler: ctx.target(handler)?,
                });
                tokens = rest;
            }
            ("finally", [start, end, rest @ ..]) if finally.is_none() => {
                finally = Some(ctx.target(start)?..ctx.target(end)?);
                tokens = rest;
            }
            (clause, _) => bail!("Malformed try clause starting at `{}`", clause),
        }
    }
    Ok(Instruction::PushTry { catches, finally })
}

fn parse_instruction(ctx: &AsmContext, tokens: &[Token]) -> Result<Instruction> {
    let (mnemonic, ops) = tokens
        .split_first()
        .ok_or_else(|| anyhow!("Missing mnemonic"))?;
    let mnemonic = mnemonic.bare()?;

    let instruction = match (mnemonic, ops) {
        ("int", [t, v]) => Instruction::SetInteger {
            target: parse_ref(t)?,
            value: v
                .bare()?
                .parse()
                .map_err(|_| anyhow!("Invalid integer `{}`", v.text))?,
        },
        ("float", [t, v]) => Instruction::SetFloat {
            target: parse_ref(t)?,
            value: v
                .bare()?
                .parse()
                .map_err(|_| anyhow!("Invalid float `{}`", v.text))?,
        },
        ("char", [t, v]) if v.quote == Some('\'') => {
            let mut chars = v.text.chars();
            let (Some(value), None) = (chars.next(), chars.next()) else {
                bail!("Char literal must hold exactly one character");
            };
            Instruction::SetChar {
                target: parse_ref(t)?,
                value,
            }
        }
        ("bool", [t, v]) => Instruction::SetBool {
            target: parse_ref(t)?,
            value: match v.bare()? {
                "true" => true,
                "false" => false,
                other => bail!("Invalid bool `{}`", other),
            },
        },
        ("string", [t, v]) if v.quote == Some('"') => Instruction::SetString {
            target: parse_ref(t)?,
            value: v.text.clone(),
        },
        ("array", [t, elements @ ..]) => Instruction::SetArray {
            target: parse_ref(t)?,
            elements: parse_refs(elements)?,
        },
        ("tuple", [t, elements @ ..]) => Instruction::SetTuple {
            target: parse_ref(t)?,
            elements: parse_refs(elements)?,
        },
        ("struct", [t, fields @ ..]) => {
            let fields = fields
                .iter()
                .map(|field| -> Result<(String, RefId)> {
                    let text = field.bare()?;
                    let (name, reference) = text
                        .split_once('=')
                        .ok_or_else(|| anyhow!("Expected `name=rN`, found `{}`", text))?;
                    let reference = Token {
                        text: reference.to_string(),
                        quote: None,
                    };
                    Ok((name.to_string(), parse_ref(&reference)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Instruction::SetStruct {
                target: parse_ref(t)?,
                fields,
            }
        }
        ("func", [t, f]) => Instruction::SetFunction {
            target: parse_ref(t)?,
            function: ctx.function(f)?,
        },
        ("copy", [t, s]) => Instruction::Copy {
            target: parse_ref(t)?,
            source: parse_ref(s)?,
        },
        ("param", [t, i]) => Instruction::LoadParam {
            target: parse_ref(t)?,
            index: parse_usize(i)?,
        },
        ("field", [t, s, name]) => Instruction::GetField {
            target: parse_ref(t)?,
            source: parse_ref(s)?,
            field: name.bare()?.to_string(),
        },
        ("element", [t, s, i]) => Instruction::GetElement {
            target: parse_ref(t)?,
            source: parse_ref(s)?,
            index: parse_usize(i)?,
        },
        ("index", [t, s, i]) => Instruction::GetIndex {
            target: parse_ref(t)?,
            source: parse_ref(s)?,
            index: parse_ref(i)?,
        },
        ("set_field", [s, name, v]) => Instruction::SetField {
            source: parse_ref(s)?,
            field: name.bare()?.to_string(),
            value: parse_ref(v)?,
        },
        ("set_index", [s, i, v]) => Instruction::SetIndex {
            source: parse_ref(s)?,
            index: parse_ref(i)?,
            value: parse_ref(v)?,
        },
        ("apply", [t, f, args @ ..]) => Instruction::PartialApply {
            target: parse_ref(t)?,
            function: parse_ref(f)?,
            args: parse_refs(args)?,
        },
        ("call", [t, f, args @ ..]) => Instruction::Call {
            target: parse_ref(t)?,
            function: parse_ref(f)?,
            args: parse_refs(args)?,
        },
        ("binop", [t, l, op, r]) => Instruction::BinaryOp {
            target: parse_ref(t)?,
            left: parse_ref(l)?,
            op: parse_operator(op, Fixity::Infix)?,
            right: parse_ref(r)?,
        },
        ("prefix", [t, op, v]) => Instruction::UnaryOp {
            target: parse_ref(t)?,
            op: parse_operator(op, Fixity::Prefix)?,
            operand: parse_ref(v)?,
        },
        ("postfix", [t, op, v]) => Instruction::UnaryOp {
            target: parse_ref(t)?,
            op: parse_operator(op, Fixity::Postfix)?,
            operand: parse_ref(v)?,
        },
        ("load_const", [t, c]) => Instruction::LoadConstant {
            target: parse_ref(t)?,
            constant: parse_const(c)?,
        },
        ("set_const", [c, v]) => Instruction::SetConstant {
            constant: parse_const(c)?,
            value: parse_ref(v)?,
        },
        ("read_error", [t]) => Instruction::ReadError {
            target: parse_ref(t)?,
        },
        ("bind", [name, r]) => Instruction::Bind {
            name: name.bare()?.to_string(),
            reference: parse_ref(r)?,
        },
        ("resolve", [t, name]) => Instruction::Resolve {
            target: parse_ref(t)?,
            name: name.bare()?.to_string(),
        },
        ("push_scope", []) => Instruction::PushScope,
        ("push_loop", [start, end]) => Instruction::PushLoop {
            start: ctx.target(start)?,
            end: ctx.target(end)?,
        },
        ("push_try", clauses) => parse_try(ctx, clauses)?,
        ("pop", []) => Instruction::PopFrame,
        ("jump", [l]) => Instruction::Jump {
            target: ctx.target(l)?,
        },
        ("br_true", [c, l]) => Instruction::BranchTrue {
            condition: parse_ref(c)?,
            target: ctx.target(l)?,
        },
        ("br_false", [c, l]) => Instruction::BranchFalse {
            condition: parse_ref(c)?,
            target: ctx.target(l)?,
        },
        ("const_br", [c, l]) => Instruction::ConstBranch {
            constant: parse_const(c)?,
            target: ctx.target(l)?,
        },
        ("nop", []) => Instruction::Nop,
        ("return", [v]) => Instruction::Return {
            value: parse_ref(v)?,
        },
        ("throw", [v]) => Instruction::Throw {
            value: parse_ref(v)?,
        },
        ("break", [d]) => Instruction::Break {
            depth: parse_usize(d)?,
        },
        ("continue", [d]) => Instruction::Continue {
            depth: parse_usize(d)?,
        },
        _ if MNEMONICS.contains(&mnemonic) => bail!("Wrong operands for `{}`", mnemonic),
        _ => bail!("Unknown mnemonic `{}`", mnemonic),
    };
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize(r#"string r0, "a \"b\" # c"  # trailing"#).unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["string", "r0", "a \"b\" # c"]);
        assert_eq!(tokens[2].quote, Some('"'));
        assert!(tokenize("string r0 \"open").is_err());
    }

    #[test]
    fn test_assemble_labels_and_functions() {
        let program = assemble(
            r#"
            fn main 1
                func r0 @helper
            top:
                call r1 r0
                br_true r1 top
                return r1
            end

            fn helper 0
                bool r2 false
                return r2
            end
            "#,
        )
        .unwrap();

        assert_eq!(program.functions.len(), 2);
        let main = &program.functions[0];
        assert_eq!(
            main.instructions[0],
            Instruction::SetFunction {
                target: 0,
                function: 1
            }
        );
        assert_eq!(
            main.instructions[2],
            Instruction::BranchTrue {
                condition: 1,
                target: 1
            }
        );
        assert_eq!(program.functions[1].params, 0);
    }

    #[test]
    fn test_assemble_try() {
        let program = assemble(
            r#"
            fn main 1
                push_try catch string handler, catch any handler finally cleanup done
                pop
            handler:
                pop
            cleanup:
                nop
            done:
            end
            "#,
        )
        .unwrap();
        let Instruction::PushTry { catches, finally } = &program.functions[0].instructions[0]
        else {
            panic!("expected a try instruction");
        };
        assert_eq!(catches[0].ty, CatchType::Kind(ValueKind::String));
        assert_eq!(catches[1].ty, CatchType::Any);
        assert_eq!(catches[0].handler, 2);
        assert_eq!(finally.clone(), Some(3..4));
    }

    #[test]
    fn test_assemble_operators_and_literals() {
        let program = assemble(
            "fn main 1\n  char r0 '\\n'\n  postfix r1 ++ r2\n  struct r3 x=r0 y=r1\nend\n",
        )
        .unwrap();
        let instructions = &program.functions[0].instructions;
        assert_eq!(
            instructions[0],
            Instruction::SetChar {
                target: 0,
                value: '\n'
            }
        );
        assert_eq!(
            instructions[1],
            Instruction::UnaryOp {
                target: 1,
                op: OperatorKey::postfix(Symbol::Increment),
                operand: 2
            }
        );
        assert_eq!(
            instructions[2],
            Instruction::SetStruct {
                target: 3,
                fields: vec![("x".into(), 0), ("y".into(), 1)]
            }
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = assemble("fn main 1\n  nop\n  frobnicate r0\nend\n").unwrap_err();
        assert_eq!(format!("{err:#}"), "line 3: Unknown mnemonic `frobnicate`");

        let err = assemble("fn main 1\n  jump nowhere\nend\n").unwrap_err();
        assert_eq!(format!("{err:#}"), "line 2: Undefined label `nowhere`");

        let err = assemble("fn main 1\n  nop\n").unwrap_err();
        assert!(format!("{err:#}").contains("missing `end`"));

        let err = assemble("fn main 1\n  int r0\nend\n").unwrap_err();
        assert_eq!(format!("{err:#}"), "line 2: Wrong operands for `int`");
    }
}
