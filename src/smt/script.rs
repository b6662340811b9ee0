use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use crate::{
    ast::{Node, NodeKind, Op},
    context::{Sort, Sorted, Variable},
};

#[derive(Debug, Default, Clone)]
pub struct Script {
    commands: Vec<Command>,
}

impl Script {
    pub fn declared_vars(&self) -> impl Iterator<Item = &Rc<Variable>> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DeclareConst(v) => Some(v),
            _ => None,
        })
    }

    pub fn push(&mut self, command: Command) {
        if let Command::NoOp = command {
            return;
        }
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// The query asking for a model of `formula` over `vars`.
    pub fn model_query(formula: &Node, vars: &[Rc<Variable>]) -> Self {
        let mut script = Script::default();
        script.push(Command::Push);
        for v in vars {
            script.push(Command::DeclareConst(v.clone()));
        }
        script.push(Command::Assert(formula.clone()));
        script.push(Command::CheckSat);
        script
    }
}

impl Display for Script {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for command in self.commands() {
            writeln!(f, "{}", command)?;
        }
        Ok(())
    }
}

/// The SMT-LIB commands sent to an oracle.
#[derive(Debug, Clone)]
pub enum Command {
    Assert(Node),
    CheckSat,
    DeclareConst(Rc<Variable>),
    Echo(String),
    Exit,
    GetValue(Vec<Rc<Variable>>),
    Push,
    Pop,
    SetLogic(String),
    SetOption(String, String),
    NoOp,
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Command::Assert(node) => write!(f, "(assert {})", node.to_smt()),
            Command::CheckSat => write!(f, "(check-sat)"),
            Command::DeclareConst(v) => {
                write!(
                    f,
                    "(declare-const {} {})",
                    escape_smt_identifier_name(v.name()),
                    v.sort().to_smt()
                )
            }
            Command::Echo(message) => write!(f, "(echo \"{}\")", message),
            Command::Exit => write!(f, "(exit)"),
            Command::GetValue(vars) => {
                let names: Vec<String> = vars
                    .iter()
                    .map(|v| escape_smt_identifier_name(v.name()))
                    .collect();
                write!(f, "(get-value ({}))", names.join(" "))
            }
            Command::Push => write!(f, "(push 1)"),
            Command::Pop => write!(f, "(pop 1)"),
            Command::SetLogic(logic) => write!(f, "(set-logic {})", logic),
            Command::SetOption(option, value) => write!(f, "(set-option :{} {})", option, value),
            Command::NoOp => Ok(()),
        }
    }
}

pub trait ToSmt {
    fn to_smt(&self) -> String;
}

impl ToSmt for Node {
    fn to_smt(&self) -> String {
        if self.children().is_empty() {
            self.kind().to_smt()
        } else {
            let ch = self
                .children()
                .iter()
                .map(|c| c.to_smt())
                .collect::<Vec<_>>()
                .join(" ");
            format!("({} {})", self.kind().to_smt(), ch)
        }
    }
}

impl ToSmt for NodeKind {
    fn to_smt(&self) -> String {
        match self {
            NodeKind::Const(v) => v.to_string(),
            NodeKind::Variable(rc) => escape_smt_identifier_name(rc.name()),
            NodeKind::Param(p) => p.to_string(),
            NodeKind::App(f) => escape_smt_identifier_name(f.name()),
            NodeKind::Op(op) => match op {
                Op::ToInt => "str.to_int".to_string(),
                Op::FromInt => "str.from_int".to_string(),
                op => op.name().to_string(),
            },
        }
    }
}

impl ToSmt for Sort {
    fn to_smt(&self) -> String {
        match self {
            Sort::BitVec(w) => format!("(_ BitVec {})", w),
            s => s.to_string(),
        }
    }
}

pub(crate) fn escape_smt_identifier_name(name: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_alphanumeric() || "_~!@$%^&*+-=<>.?/".contains(c))
        && !name.starts_with(|c: char| c.is_ascii_digit())
    {
        name.to_string()
    } else {
        format!("|{}|", name)
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;

    use super::*;

    #[test]
    fn renders_model_query() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::BitVec(8)).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let neg = ctx.ast().op(Op::BvNeg, vec![xn.clone()]).unwrap();
        let f = ctx.ast().op(Op::BvUlt, vec![xn, neg]).unwrap();
        let script = Script::model_query(&f, &[x]);
        assert_eq!(
            script.to_string(),
            "(push 1)\n(declare-const x (_ BitVec 8))\n(assert (bvult x (bvneg x)))\n(check-sat)\n"
        );
        assert_eq!(script.declared_vars().count(), 1);
    }

    #[test]
    fn odd_names_are_quoted() {
        assert_eq!(escape_smt_identifier_name("x_1"), "x_1");
        assert_eq!(escape_smt_identifier_name("a b"), "|a b|");
        assert_eq!(escape_smt_identifier_name("1x"), "|1x|");
    }
}
