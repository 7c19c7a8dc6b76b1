//! Sample programs.
//!
//! Each program is written the way generated code drives the runtime: values
//! are [`Boxed`], effectful steps are sequenced with [`Ctl::bind`], and
//! handlers are built from clauses.

use std::cell::Cell;
use std::rc::Rc;

use ichor_runtime::{Boxed, Clause, Context, Ctl, EffectTag, HandlerBuilder, Obj, Op, Reuse, Tag};

/// Constructor tag of list cells. The empty list is unit.
pub const CONS: Tag = Tag::new(1);

const COUNT: EffectTag = EffectTag::new("count");
const ONE: Op = Op::new(COUNT, 0);
const TWO: Op = Op::new(COUNT, 1);

const STATE: EffectTag = EffectTag::new("state");
const GET: Op = Op::new(STATE, 0);
const PUT: Op = Op::new(STATE, 1);

const AMB: EffectTag = EffectTag::new("amb");
const FLIP: Op = Op::new(AMB, 0);

const EXN: EffectTag = EffectTag::new("exn");
const RAISE: Op = Op::new(EXN, 0);

/// Largest input accepted by `choice`; its result has `2^input` elements.
pub const MAX_CHOICE_INPUT: i64 = 16;

/// A runnable sample.
pub struct Program {
    pub name: &'static str,
    pub description: &'static str,
    pub default_input: i64,
    run: fn(&mut Context, i64) -> Ctl,
}

impl Program {
    pub fn run(&self, ctx: &mut Context, input: i64) -> Ctl {
        (self.run)(ctx, input)
    }
}

pub const PROGRAMS: &[Program] = &[
    Program {
        name: "count",
        description: "two(one(n)) under a handler with one(a) = a+1 and two(a) = a+2",
        default_input: 5,
        run: count,
    },
    Program {
        name: "state",
        description: "sum n down to zero through get/put on a state handler",
        default_input: 10,
        run: state,
    },
    Program {
        name: "choice",
        description: "parity of n flips, collected over every resumption",
        default_input: 3,
        run: choice,
    },
    Program {
        name: "raise",
        description: "100 / n, raising a non-resumable error on zero",
        default_input: 0,
        run: raise,
    },
    Program {
        name: "reuse",
        description: "increment every element of a unique list of n cells in place, then sum",
        default_input: 1000,
        run: reuse,
    },
];

pub fn find(name: &str) -> Option<&'static Program> {
    PROGRAMS.iter().find(|program| program.name == name)
}

fn int(value: &Boxed) -> i64 {
    value.as_i64().unwrap_or_default()
}

fn first_int(args: &[Boxed]) -> i64 {
    args.first().map(int).unwrap_or_default()
}

// count

fn count_handler() -> Obj {
    HandlerBuilder::new(COUNT)
        .op(Clause::value(|args| Boxed::from_i64(first_int(&args) + 1)))
        .op(Clause::value(|args| Boxed::from_i64(first_int(&args) + 2)))
        .build()
}

fn count(ctx: &mut Context, input: i64) -> Ctl {
    ctx.handle_default(count_handler(), move |ctx| {
        ctx.perform(ONE, vec![Boxed::from_i64(input)])
            .bind(ctx, |ctx, a| ctx.perform(TWO, vec![a]))
    })
}

// state

fn state_handler(cell: Rc<Cell<i64>>) -> Obj {
    let reader = Rc::clone(&cell);
    HandlerBuilder::new(STATE)
        .op(Clause::value(move |_| Boxed::from_i64(reader.get())))
        .op(Clause::value(move |args| {
            cell.set(first_int(&args));
            Boxed::unit()
        }))
        .build()
}

fn sum_down(ctx: &mut Context, acc: i64) -> Ctl {
    ctx.perform(GET, Vec::new()).bind(ctx, move |ctx, x| {
        let x = int(&x);
        if x <= 0 {
            return Ctl::pure(acc);
        }
        ctx.perform(PUT, vec![Boxed::from_i64(x - 1)])
            .bind(ctx, move |_, _| Ctl::defer(move |ctx| sum_down(ctx, acc + x)))
    })
}

fn state(ctx: &mut Context, input: i64) -> Ctl {
    let cell = Rc::new(Cell::new(input));
    ctx.handle_default(state_handler(cell), |ctx| sum_down(ctx, 0))
}

// choice

fn cons(head: Boxed, tail: Boxed) -> Boxed {
    Obj::alloc(CONS, [head, tail]).into()
}

/// Elements of a list of small values.
pub fn list_to_vec(list: &Boxed) -> Vec<i64> {
    let mut out = Vec::new();
    let mut cur = list;
    while let Some(cell) = cur.as_obj().filter(|cell| cell.tag() == CONS) {
        out.push(int(&cell.fields()[0]));
        cur = &cell.fields()[1];
    }
    out
}

fn list_from(values: impl DoubleEndedIterator<Item = i64>) -> Boxed {
    values
        .rev()
        .fold(Boxed::unit(), |tail, v| cons(Boxed::from_i64(v), tail))
}

fn append(xs: &Boxed, ys: &Boxed) -> Boxed {
    let mut all = list_to_vec(xs);
    all.extend(list_to_vec(ys));
    list_from(all.into_iter())
}

fn amb_handler() -> Obj {
    HandlerBuilder::new(AMB)
        .op(Clause::control(|ctx, _, k| {
            k.resume(ctx, Boxed::from_bool(false)).bind(ctx, move |ctx, xs| {
                k.resume(ctx, Boxed::from_bool(true))
                    .map(move |ys| append(&xs, &ys))
            })
        }))
        .build()
}

fn flips(ctx: &mut Context, remaining: i64, parity: bool) -> Ctl {
    if remaining <= 0 {
        return Ctl::pure(parity);
    }
    ctx.perform(FLIP, Vec::new()).bind(ctx, move |ctx, bit| {
        let bit = bit.as_bool().unwrap_or_default();
        flips(ctx, remaining - 1, parity ^ bit)
    })
}

fn choice(ctx: &mut Context, input: i64) -> Ctl {
    let input = input.clamp(0, MAX_CHOICE_INPUT);
    ctx.handle(
        amb_handler(),
        |_, value| Ctl::Pure(cons(value, Boxed::unit())),
        move |ctx| flips(ctx, input, false),
    )
}

// raise

fn exn_handler() -> Obj {
    HandlerBuilder::new(EXN)
        .op(Clause::never(|_, args| {
            let message = args.into_iter().next().unwrap_or_else(Boxed::unit);
            Ctl::Pure(message)
        }))
        .build()
}

fn raise(ctx: &mut Context, input: i64) -> Ctl {
    ctx.handle_default(exn_handler(), move |ctx| {
        if input == 0 {
            ctx.perform(RAISE, vec![Boxed::string("division by zero")])
        } else {
            Ctl::pure(100 / input)
        }
    })
}

// reuse

/// Increment every element, writing into cells that are uniquely owned.
pub fn increment_in_place(list: Boxed) -> Boxed {
    let mut cells: Vec<(Option<Reuse>, Boxed)> = Vec::new();
    let mut cur = list;
    let mut out = loop {
        let cell = match cur.into_obj() {
            Ok(cell) => cell,
            Err(nil) => break nil,
        };
        let (hole, head, tail) = match cell.try_unique() {
            Ok(mut unique) => {
                let head = unique.take_field(0);
                let tail = unique.take_field(1);
                (Some(unique.reuse()), head, tail)
            }
            Err(shared) => (None, shared.fields()[0].dup(), shared.fields()[1].dup()),
        };
        cells.push((hole, head));
        cur = tail;
    };
    while let Some((hole, head)) = cells.pop() {
        out = Obj::alloc_at(hole, CONS, [Boxed::from_i64(int(&head) + 1), out]).into();
    }
    out
}

fn reuse(_: &mut Context, input: i64) -> Ctl {
    let list = list_from(0..input.max(0));
    let list = increment_in_place(list);
    Ctl::pure(list_to_vec(&list).iter().sum::<i64>())
}

/// Render a result value for display.
pub fn render(value: &Boxed) -> String {
    if let Some(n) = value.as_i64() {
        return n.to_string();
    }
    if let Some(text) = value.as_str() {
        return text.to_string();
    }
    if let Some(x) = value.as_f64() {
        return x.to_string();
    }
    match value.as_obj() {
        Some(obj) if obj.tag() == CONS => {
            let items: Vec<String> = list_to_vec(value).iter().map(i64::to_string).collect();
            format!("[{}]", items.join(", "))
        }
        Some(obj) => format!("<{}>", obj.tag()),
        None => String::from("()"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ichor_runtime::stats;
    use pretty_assertions::assert_eq;

    fn run(name: &str, input: i64) -> String {
        let mut ctx = Context::default();
        let program = find(name).unwrap();
        let value = ctx.run(|ctx| program.run(ctx, input)).unwrap();
        render(&value)
    }

    #[test]
    fn test_count() {
        assert_eq!(run("count", 5), "8");
    }

    #[test]
    fn test_state_sums_down() {
        assert_eq!(run("state", 10), "55");
        assert_eq!(run("state", 0), "0");
    }

    #[test]
    fn test_state_handles_long_loops() {
        let n = 200_000i64;
        assert_eq!(run("state", n), (n * (n + 1) / 2).to_string());
    }

    #[test]
    fn test_choice_enumerates_parities() {
        assert_eq!(run("choice", 2), "[0, 1, 1, 0]");
        assert_eq!(run("choice", 0), "[0]");
    }

    #[test]
    fn test_raise() {
        assert_eq!(run("raise", 0), "division by zero");
        assert_eq!(run("raise", 4), "25");
    }

    #[test]
    fn test_reuse_allocates_list_once() {
        let before = stats::snapshot();
        assert_eq!(run("reuse", 100), "5050");
        let delta = stats::snapshot().since(&before);
        assert_eq!(delta.allocs, 100);
        assert_eq!(delta.reuses, 100);
        assert_eq!(delta.live_objects(), 0);
    }

    #[test]
    fn test_every_program_leaves_no_live_objects() {
        for program in PROGRAMS {
            let before = stats::snapshot();
            run(program.name, program.default_input);
            let delta = stats::snapshot().since(&before);
            assert_eq!(delta.live_objects(), 0, "{}", program.name);
            assert_eq!(delta.live_handlers(), 0, "{}", program.name);
        }
    }

    #[test]
    fn test_unknown_program() {
        assert!(find("missing").is_none());
    }
}
