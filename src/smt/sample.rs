//! A bounded oracle that searches a grid of small values.
//!
//! It reports a model only where the formula holds or cannot be evaluated, and it may miss
//! models outside the grid. Solutions it accepts are only checked on the grid.

use std::rc::Rc;

use indexmap::IndexSet;
use itertools::Itertools;

use crate::{
    ast::{get_constants, Node},
    context::{Sort, Sorted, Variable},
    spec::Point,
    theory::{bv_mask, EvalError, Evaluator, Interpretation, Value},
};

use super::{Oracle, OracleError};

/// Upper limit on the number of points evaluated per query.
const DEFAULT_MAX_SAMPLES: usize = 200_000;

#[derive(Debug, Clone)]
pub struct SampleOracle {
    /// Integers from `-bound` to `bound` are sampled
    bound: i64,
    max_samples: usize,
}

impl SampleOracle {
    pub fn new(bound: i64) -> Self {
        Self {
            bound,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    /// The values tried for a variable of the given sort, smallest first.
    fn domain(&self, sort: &Sort, constants: &IndexSet<Value>) -> Vec<Value> {
        let mut values: IndexSet<Value> = IndexSet::new();
        match sort {
            Sort::Bool => {
                values.insert(Value::Bool(false));
                values.insert(Value::Bool(true));
            }
            Sort::Int => {
                for i in 0..=self.bound {
                    values.insert(Value::Int(i));
                    values.insert(Value::Int(-i));
                }
                for c in constants.iter().filter_map(|c| c.as_int()) {
                    for d in [c, c.saturating_add(1), c.saturating_sub(1)] {
                        values.insert(Value::Int(d));
                    }
                }
            }
            Sort::BitVec(w) => {
                let mask = bv_mask(*w);
                for b in 0..=(self.bound.max(0) as u64) {
                    values.insert(Value::bv(b, *w));
                }
                values.insert(Value::bv(mask, *w));
                values.insert(Value::bv(mask - 1, *w));
                values.insert(Value::bv(1u64 << (w - 1), *w));
                for c in constants.iter() {
                    if let Value::BitVec { bits, width } = c {
                        if width == w {
                            for d in [*bits, bits.wrapping_add(1), bits.wrapping_sub(1)] {
                                values.insert(Value::bv(d, *w));
                            }
                        }
                    }
                }
            }
            Sort::String => {
                for s in ["", "a", "b", " ", "ab", "ba"] {
                    values.insert(Value::string(s));
                }
                for c in constants.iter() {
                    if let Value::String(s) = c {
                        values.insert(Value::String(s.clone()));
                    }
                }
            }
            Sort::Tuple(sorts) => {
                let parts: Vec<Vec<Value>> =
                    sorts.iter().map(|s| self.domain(s, constants)).collect();
                for combination in parts.into_iter().multi_cartesian_product().take(16) {
                    values.insert(Value::Tuple(Rc::from(combination)));
                }
            }
        }
        let mut values: Vec<Value> = values.into_iter().collect();
        values.sort_by_key(|v| v.magnitude());
        values
    }
}

impl Oracle for SampleOracle {
    fn find_model(
        &mut self,
        formula: &Node,
        vars: &IndexSet<Rc<Variable>>,
    ) -> Result<Option<Point>, OracleError> {
        if formula.is_false() {
            return Ok(None);
        }
        let constants = get_constants(formula);
        let occurring = formula.variables();
        // variables that do not occur only take their first value
        let domains: Vec<Vec<Value>> = vars
            .iter()
            .map(|v| {
                let mut d = self.domain(&v.sort(), &constants);
                if !occurring.contains(v) {
                    d.truncate(1);
                }
                d
            })
            .collect();
        if domains.iter().any(|d| d.is_empty()) {
            return Ok(None);
        }

        let interp = Interpretation::new();
        let eval = Evaluator::new(vars, &interp);
        let points: Box<dyn Iterator<Item = Point>> = if domains.is_empty() {
            Box::new(std::iter::once(vec![]))
        } else {
            Box::new(domains.into_iter().multi_cartesian_product())
        };
        let mut undefined: Option<(Point, EvalError)> = None;
        for point in points.take(self.max_samples) {
            match eval.holds(formula, &point) {
                Ok(true) => {
                    log::trace!("Sample model found");
                    return Ok(Some(point));
                }
                Ok(false) => {}
                Err(e @ (EvalError::DivisionByZero | EvalError::Overflow)) => {
                    if undefined.is_none() {
                        undefined = Some((point, e));
                    }
                }
                Err(e) => log::trace!("Skipping sample: {}", e),
            }
        }
        // the formula is undefined there, so the grid does not show it unsatisfiable
        if let Some((point, e)) = undefined {
            log::warn!("Formula is undefined at {:?} ({}), reporting it as a model", point, e);
            return Ok(Some(point));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ast::Op, context::Context};

    use super::*;

    #[test]
    fn finds_small_model() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let y = ctx.declare_var("y", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let yn = ctx.ast().variable(y.clone());
        let lt = ctx.ast().lt(xn, yn);
        let vars: IndexSet<_> = [x, y].into_iter().collect();
        let model = SampleOracle::new(2).find_model(&lt, &vars).unwrap().unwrap();
        assert!(model[0].as_int().unwrap() < model[1].as_int().unwrap());
    }

    #[test]
    fn uses_formula_constants() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let big = ctx.ast().int(100);
        let eq = ctx.ast().eq(xn, big);
        let vars: IndexSet<_> = [x].into_iter().collect();
        let model = SampleOracle::new(2).find_model(&eq, &vars).unwrap();
        assert_eq!(model, Some(vec![Value::Int(100)]));
    }

    #[test]
    fn unsatisfiable_has_no_model() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::BitVec(4)).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let ult = ctx.ast().op(Op::BvUlt, vec![xn.clone(), xn]).unwrap();
        let vars: IndexSet<_> = [x].into_iter().collect();
        assert_eq!(SampleOracle::new(3).find_model(&ult, &vars).unwrap(), None);
    }

    #[test]
    fn undefined_point_is_reported() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let one = ctx.ast().int(1);
        // (div 1 x) is undefined only at zero
        let div = ctx.ast().op(Op::Div, vec![one, xn]).unwrap();
        let big = ctx.ast().int(7);
        let gt = ctx.ast().lt(big, div);
        let vars: IndexSet<_> = [x].into_iter().collect();
        assert_eq!(
            SampleOracle::new(2).find_model(&gt, &vars).unwrap(),
            Some(vec![Value::Int(0)])
        );
    }
}
