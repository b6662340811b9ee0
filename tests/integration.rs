use std::path::Path;

use eusynth::{parse_benchmark, synthesize, Context, SynthOptions};
use test_generator::test_resources;

fn solve_file(file: &str) -> Vec<String> {
    let sl = std::io::BufReader::new(std::fs::File::open(Path::new(file)).unwrap());
    match synthesize(sl, SynthOptions::sampling(4)) {
        Ok(defs) => defs,
        Err(err) => panic!("{}: {}", file, err),
    }
}

#[test_resources("res/**/*.sl")]
fn test_solved(sl: &str) {
    let text = std::fs::read_to_string(sl).unwrap();
    let mut ctx = Context::default();
    let benchmark = parse_benchmark(&text, &mut ctx).unwrap();

    let defs = solve_file(sl);
    assert_eq!(defs.len(), benchmark.targets.len());
    for (def, target) in defs.iter().zip(&benchmark.targets) {
        assert!(
            def.starts_with(&format!("(define-fun {} (", target.name())),
            "{}",
            def
        );
    }
}

#[test]
fn successor() {
    assert_eq!(
        solve_file("res/lia/succ.sl"),
        vec!["(define-fun f ((x Int)) Int\n     (+ x 1))"]
    );
}

#[test]
fn plus_one_from_examples() {
    assert_eq!(
        solve_file("res/pbe/plus_one.sl"),
        vec!["(define-fun f ((x Int)) Int\n     (+ x 1))"]
    );
}

#[test]
fn bitvector_double() {
    assert_eq!(
        solve_file("res/bv/double.sl"),
        vec!["(define-fun f ((x (_ BitVec 8))) (_ BitVec 8)\n     (bvadd x x))"]
    );
}

#[test]
fn two_targets_are_split() {
    assert_eq!(
        solve_file("res/multi/two_targets.sl"),
        vec![
            "(define-fun f ((x Int)) Int\n     x)",
            "(define-fun g ((x Int)) Int\n     x)"
        ]
    );
}

#[test]
fn max2_with_grammar_uses_conditionals() {
    let defs = solve_file("res/lia/max2_grammar.sl");
    assert_eq!(defs.len(), 1);
    assert!(defs[0].contains("(ite "), "{}", defs[0]);
    assert!(!defs[0].contains("__"), "marker left in {}", defs[0]);
}

#[test]
fn unsupported_logic_is_an_error() {
    let src = "(set-logic LRA) (synth-fun f ((x Real)) Real) (check-synth)";
    assert!(synthesize(src.as_bytes(), SynthOptions::sampling(2)).is_err());
}
