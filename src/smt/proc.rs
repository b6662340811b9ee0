//! An oracle backed by an SMT solver process speaking SMT-LIB on stdin/stdout.

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command as Process, Stdio},
    rc::Rc,
};

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::Node,
    context::{Sorted, Variable},
    sexp::{self, Sexp},
    spec::Point,
    theory::Value,
};

use super::{
    script::{escape_smt_identifier_name, Command, Script},
    Oracle, OracleError,
};

/// A solver's response to `(check-sat)`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SatResp {
    Sat,
    Unsat,
    Unknown(String),
}

/// A running solver process.
#[derive(Debug)]
pub struct SmtOracle {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    queries: usize,
}

impl SmtOracle {
    /// A marker for determining end of solver response.
    const DONE: &'static str = "<<DONE>>";

    /// Starts the solver given by a command line such as `z3 -in`.
    pub fn new(cmdline: &str) -> Result<Self, OracleError> {
        let mut parts = cmdline.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| OracleError::Solver("empty solver command".to_string()))?;
        let mut child = Process::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OracleError::Solver("no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OracleError::Solver("no stdout".to_string()))?;
        let mut proc = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            queries: 0,
        };
        proc.send(&Command::SetOption(
            "produce-models".to_string(),
            "true".to_string(),
        ))?;
        proc.send(&Command::SetLogic("ALL".to_string()))?;
        log::debug!("Started solver `{}`", cmdline);
        Ok(proc)
    }

    fn send(&mut self, cmd: &Command) -> Result<(), OracleError> {
        log::trace!("> {}", cmd);
        writeln!(self.stdin, "{}", cmd)?;
        Ok(())
    }

    /// Waits for the solver to answer everything sent so far. Returns the answer text.
    fn get_response(&mut self) -> Result<String, OracleError> {
        self.send(&Command::Echo(Self::DONE.to_string()))?;
        self.stdin.flush()?;
        let mut buf = String::new();
        loop {
            let last_end = buf.len();
            let n = self.stdout.read_line(&mut buf)?;
            if n == 0 {
                return Err(OracleError::Solver(format!(
                    "solver closed its output: {}",
                    buf.trim()
                )));
            }
            let last_line = buf[last_end..].trim_end();
            // z3 does not quote echoed strings, cvc5 does
            if last_line == Self::DONE || last_line == format!("\"{}\"", Self::DONE) {
                let response = buf[..last_end].trim().to_string();
                log::trace!("< {}", response);
                return Ok(response);
            }
        }
    }

    fn check_sat(&mut self) -> Result<SatResp, OracleError> {
        let resp = self.get_response()?;
        match resp.as_str() {
            "sat" => Ok(SatResp::Sat),
            "unsat" => Ok(SatResp::Unsat),
            "unknown" => Ok(SatResp::Unknown(resp)),
            _ => Err(OracleError::Solver(resp)),
        }
    }

    fn get_values(&mut self, vars: &[Rc<Variable>]) -> Result<Point, OracleError> {
        if vars.is_empty() {
            return Ok(vec![]);
        }
        self.send(&Command::GetValue(vars.to_vec()))?;
        let resp = self.get_response()?;
        let sexp = sexp::parse(&resp).map_err(|e| OracleError::Model(e.to_string()))?;
        let pairs = sexp
            .list()
            .ok_or_else(|| OracleError::Model(resp.clone()))?;
        let mut values: IndexMap<String, Value> = IndexMap::new();
        for pair in pairs {
            match pair.list() {
                Some([Sexp::Atom(sexp::Atom::Symbol(name)), value]) => {
                    let v = Value::from_sexp(value)
                        .ok_or_else(|| OracleError::Model(value.to_string()))?;
                    values.insert(name.clone(), v);
                }
                _ => return Err(OracleError::Model(pair.to_string())),
            }
        }
        vars.iter()
            .map(|v| {
                values
                    .get(v.name())
                    .or_else(|| values.get(&escape_smt_identifier_name(v.name())))
                    .cloned()
                    .filter(|val| val.sort() == v.sort())
                    .ok_or_else(|| OracleError::Model(format!("no value for {}", v)))
            })
            .collect()
    }
}

impl Oracle for SmtOracle {
    fn find_model(
        &mut self,
        formula: &Node,
        vars: &IndexSet<Rc<Variable>>,
    ) -> Result<Option<Point>, OracleError> {
        self.queries += 1;
        let vars: Vec<Rc<Variable>> = vars.iter().cloned().collect();
        let script = Script::model_query(formula, &vars);
        for cmd in script.iter() {
            self.send(cmd)?;
        }
        let result = match self.check_sat()? {
            SatResp::Unsat => Ok(None),
            SatResp::Sat => self.get_values(&vars).map(Some),
            SatResp::Unknown(reason) => Err(OracleError::Unknown(reason)),
        };
        self.send(&Command::Pop)?;
        result
    }
}

impl Drop for SmtOracle {
    fn drop(&mut self) {
        log::debug!("Solver answered {} queries", self.queries);
        _ = writeln!(self.stdin, "{}", Command::Exit);
        _ = self.stdin.flush();
        _ = self.child.kill();
        _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::context::{Context, Sort};

    use super::*;

    fn z3() -> Option<SmtOracle> {
        SmtOracle::new("z3 -in").ok()
    }

    #[test]
    #[serial]
    fn z3_finds_model() {
        let Some(mut oracle) = z3() else {
            return;
        };
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let five = ctx.ast().int(5);
        let f = ctx.ast().eq(xn, five);
        let vars: IndexSet<_> = [x].into_iter().collect();
        let model = oracle.find_model(&f, &vars).unwrap();
        assert_eq!(model, Some(vec![Value::Int(5)]));
    }

    #[test]
    #[serial]
    fn z3_reports_unsat() {
        let Some(mut oracle) = z3() else {
            return;
        };
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let lt = ctx.ast().lt(xn.clone(), xn);
        let vars: IndexSet<_> = [x].into_iter().collect();
        assert_eq!(oracle.find_model(&lt, &vars).unwrap(), None);
    }
}
