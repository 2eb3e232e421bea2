//! A demonstration session built directly against the library, in lieu of
//! the external parser: declares a tiny theory, runs a few derivations and
//! a handler, and prints the resulting judgements.

use mirach::syntax::{
    self, HandlerSyntax, OpCase, Pattern, TopCmd, TopItem,
};
use mirach::{Loc, Name, Session};
use std::process::ExitCode;

fn usage() {
    println!("Usage: mirach [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -v, --version        print version");
    println!("  -h, --help           print this help");
    println!("      --verbosity <N>  diagnostic chattiness (default 0)");
}

fn name(s: &str) -> Name {
    Name::intern(s).unwrap()
}

fn item(cmd: TopCmd) -> TopItem {
    TopItem {
        cmd,
        loc: Loc::unknown(),
    }
}

/// constant A : Type
/// constant a : A
/// do refl a
/// let id = λ (x : A), x
/// do id a
/// fail a a
/// operation ask : 1
/// do with (handler ask x → yield x) handle (ask "hello")
/// dynamic mode = "quiet"
/// do now mode = "loud" in current mode
fn demo_items() -> Vec<TopItem> {
    let loc = Loc::unknown();
    let a_ty = name("A");
    let a = name("a");
    let x = name("x");
    let ask = name("ask");
    let mode = name("mode");

    vec![
        item(TopCmd::DeclConstant(a_ty, syntax::mk_universe(loc))),
        item(TopCmd::DeclConstant(a, syntax::mk_constant(a_ty, loc))),
        item(TopCmd::TopDo(syntax::mk_refl(
            syntax::mk_constant(a, loc),
            loc,
        ))),
        item(TopCmd::TopLet(vec![syntax::LetClause {
            pat: Pattern::Var(name("id")),
            comp: syntax::mk_abstract(
                x,
                syntax::mk_constant(a_ty, loc),
                syntax::mk_return_bound(0, loc),
                loc,
            ),
        }])),
        item(TopCmd::TopDo(syntax::mk_let1(
            Pattern::Var(a),
            syntax::mk_constant(a, loc),
            syntax::mk_apply(syntax::mk_bound(1, loc), syntax::mk_bound(0, loc), loc),
            loc,
        ))),
        // applying a non-function is a typing error, which `fail` expects
        item(TopCmd::TopFail(syntax::mk_let1(
            Pattern::Var(a),
            syntax::mk_constant(a, loc),
            syntax::mk_apply(syntax::mk_bound(0, loc), syntax::mk_bound(0, loc), loc),
            loc,
        ))),
        item(TopCmd::DeclOperation(ask, 1)),
        item(TopCmd::TopDo(syntax::mk_with(
            syntax::mk_handler(
                HandlerSyntax {
                    on_value: None,
                    on_op: vec![OpCase {
                        op: ask,
                        pats: vec![Pattern::Var(x)],
                        body: syntax::mk_yield(syntax::mk_bound(0, loc), loc),
                    }],
                    on_finally: None,
                },
                loc,
            ),
            syntax::mk_operation(ask, vec![syntax::mk_string("hello", loc)], loc),
            loc,
        ))),
        item(TopCmd::TopDynamic(
            mode,
            syntax::mk_return(syntax::mk_string("quiet", loc)),
        )),
        item(TopCmd::TopDo(syntax::mk_now(
            mode,
            syntax::mk_return(syntax::mk_string("loud", loc)),
            syntax::mk_current(mode, loc),
            loc,
        ))),
    ]
}

fn run(verbosity: usize) -> anyhow::Result<()> {
    let mut session = Session::new()?;
    session.set_verbosity(verbosity);
    for item in demo_items() {
        if let Some(v) = session.run(&item)? {
            println!("{v}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let mut verbosity = 0;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--version" => {
                println!("mirach {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "-h" | "--help" => {
                usage();
                return ExitCode::SUCCESS;
            }
            "--verbosity" => {
                let Some(n) = args.next().and_then(|s| s.parse().ok()) else {
                    eprintln!("--verbosity expects an integer");
                    return ExitCode::FAILURE;
                };
                verbosity = n;
            }
            other => {
                eprintln!("unknown argument `{other}`");
                usage();
                return ExitCode::FAILURE;
            }
        }
    }
    match run(verbosity) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mirach: error");
            for cause in err.chain() {
                eprintln!("  - {cause}");
            }
            ExitCode::FAILURE
        }
    }
}
