#![cfg(feature = "parser")]

use lci::decls::Declarations;
use lci::freevars::{free_variables, set_closed_flags};
use lci::intern::{Interner, Name};
use lci::operators::OperatorTable;
use lci::parser::parse_term;
use lci::reduce::Reducer;
use lci::render::{RenderOptions, render};
use lci::term::{TermId, TermKind, TermPool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 0x1c1;
const ROUNDS: usize = 300;

struct Generator {
    rng: StdRng,
    vars: Vec<Name>,
    closed: bool,
}

impl Generator {
    fn new(names: &mut Interner, closed: bool) -> Self {
        Generator {
            rng: StdRng::seed_from_u64(SEED),
            vars: ["a", "b", "x", "y", "z"].map(|v| names.intern(v)).to_vec(),
            closed,
        }
    }

    fn pick(&mut self, from: &[Name]) -> Name {
        from[self.rng.gen_range(0..from.len())]
    }

    fn term(&mut self, pool: &mut TermPool, scope: &mut Vec<Name>, depth: usize) -> TermId {
        if depth == 0 || self.rng.gen_ratio(1, 4) {
            if !scope.is_empty() && (self.closed || self.rng.gen_bool(0.7)) {
                let v = self.pick(&scope.clone());
                return pool.var(v);
            }
            let v = self.pick(&self.vars.clone());
            let body = pool.var(v);
            return if self.closed { pool.abstr(v, body) } else { body };
        }
        if self.rng.gen_bool(0.4) {
            let param = self.pick(&self.vars.clone());
            scope.push(param);
            let body = self.term(pool, scope, depth - 1);
            scope.pop();
            pool.abstr(param, body)
        } else {
            let func = self.term(pool, scope, depth - 1);
            let arg = self.term(pool, scope, depth - 1);
            pool.appl(func, arg)
        }
    }
}

fn assert_closed_flags_sound(pool: &TermPool, term: TermId) {
    let mut stack = vec![term];
    while let Some(id) = stack.pop() {
        if pool.is_closed(id) {
            assert!(free_variables(pool, id).is_empty());
        }
        match pool.kind(id) {
            TermKind::Abstr { body, .. } => stack.push(body),
            TermKind::Appl { func, arg, .. } => {
                stack.push(func);
                stack.push(arg);
            }
            _ => {}
        }
    }
}

#[test]
fn test_rendered_terms_read_back() {
    let mut pool = TermPool::new();
    let mut names = Interner::new();
    let ops = OperatorTable::new();
    let mut generator = Generator::new(&mut names, false);

    for show_parens in [false, true] {
        let options = RenderOptions {
            show_parens,
            readable: false,
            ..RenderOptions::default()
        };
        for _ in 0..ROUNDS {
            let term = generator.term(&mut pool, &mut Vec::new(), 6);
            let text = render(&pool, &names, term, &options);
            let reread = match parse_term(&text, &mut pool, &mut names, &ops) {
                Ok(t) => t,
                Err(e) => panic!("{text}: {e}"),
            };
            assert!(pool.same_shape(term, reread), "{text}");
            pool.release(term);
            pool.release(reread);
        }
    }
    assert_eq!(pool.live_count(), 0);
}

#[test]
fn test_reduction_keeps_flags_sound_and_frees_everything() {
    let mut pool = TermPool::new();
    let mut names = Interner::new();
    let decls = Declarations::new();
    let mut generator = Generator::new(&mut names, true);

    for _ in 0..ROUNDS {
        let term = generator.term(&mut pool, &mut Vec::new(), 5);
        set_closed_flags(&mut pool, term);
        assert!(pool.is_closed(term));

        for _ in 0..60 {
            let mut reducer = Reducer {
                pool: &mut pool,
                names: &mut names,
                decls: &decls,
            };
            match reducer.step(term) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => panic!("closed term failed to reduce: {e}"),
            }
            assert_closed_flags_sound(&pool, term);
            assert!(free_variables(&pool, term).is_empty());
            if pool.size(term) > 5_000 {
                break;
            }
        }
        pool.release(term);
        assert_eq!(pool.live_count(), 0);
    }
}
