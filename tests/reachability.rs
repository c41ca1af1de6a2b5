//! End to end checks of the pipeline: declare or load a net, build it,
//! answer a query, replay the trace.

use RustCPN::io::{
    self, ArcModel, ColorTypeModel, NetModel, PlaceModel, QueryModel, TransitionModel,
    VariableModel,
};
use RustCPN::net::ast::{ArcExpression, ColorExpression, GuardExpression};
use RustCPN::net::builder::TokenDecl;
use RustCPN::net::{ColoredNet, NetBuilder};
use RustCPN::query::{Condition, CountExpression};
use RustCPN::search::{GeneratorMode, SearchSettings, SuccessorGenerator, Verdict, Worklist};

const SEATS: [&str; 5] = ["s0", "s1", "s2", "s3", "s4"];

fn single_var(name: &str) -> ArcExpression {
    ArcExpression::Single(ColorExpression::var(name))
}

fn right_fork(name: &str) -> ArcExpression {
    ArcExpression::Single(ColorExpression::Successor(Box::new(ColorExpression::var(
        name,
    ))))
}

fn tokens_in(place: &str) -> CountExpression {
    CountExpression::Place(place.to_owned())
}

/// Five philosophers picking up their left fork first, then the right one.
/// Everyone clutching a left fork with no fork left on the table is the
/// classic deadlock.
fn philosophers() -> ColoredNet {
    let mut builder = NetBuilder::new();
    builder.add_color_type("seat");
    for seat in SEATS {
        builder.add_to_color_type("seat", seat);
    }
    builder.add_variable("x", "seat");

    let everyone: Vec<TokenDecl> = SEATS
        .iter()
        .map(|&seat| TokenDecl::new(&[seat], 1))
        .collect();
    builder.add_place("thinking", &["seat"], everyone.clone());
    builder.add_place("forks", &["seat"], everyone);
    builder.add_place("hasleft", &["seat"], vec![]);
    builder.add_place("eating", &["seat"], vec![]);

    builder.add_transition("take_left", None);
    builder.add_input_arc("thinking", "take_left", single_var("x"));
    builder.add_input_arc("forks", "take_left", single_var("x"));
    builder.add_output_arc("take_left", "hasleft", single_var("x"));

    builder.add_transition("take_right", None);
    builder.add_input_arc("hasleft", "take_right", single_var("x"));
    builder.add_input_arc("forks", "take_right", right_fork("x"));
    builder.add_output_arc("take_right", "eating", single_var("x"));

    builder.add_transition("put_down", None);
    builder.add_input_arc("eating", "put_down", single_var("x"));
    builder.add_output_arc("put_down", "thinking", single_var("x"));
    builder.add_output_arc(
        "put_down",
        "forks",
        ArcExpression::Add(vec![single_var("x"), right_fork("x")]),
    );

    builder.build().unwrap()
}

#[test]
fn someone_gets_to_eat() {
    let net = philosophers();
    let query = Condition::ExistsFinally(Box::new(Condition::LessThanOrEqual(
        CountExpression::Literal(1),
        tokens_in("eating"),
    )));
    let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
    assert_eq!(worklist.check(), Verdict::Satisfied);
    assert!(worklist.counter_example_id().is_some());
}

#[test]
fn five_forks_feed_at_most_two() {
    let net = philosophers();
    let query = Condition::AlwaysGlobally(Box::new(Condition::LessThanOrEqual(
        tokens_in("eating"),
        CountExpression::Literal(2),
    )));
    let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
    assert_eq!(worklist.check(), Verdict::Satisfied);
    assert!(worklist.was_complete());
}

#[test]
fn three_eaters_are_out_of_reach() {
    let net = philosophers();
    let query = Condition::ExistsFinally(Box::new(Condition::Equal(
        tokens_in("eating"),
        CountExpression::Literal(3),
    )));
    let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
    assert_eq!(worklist.check(), Verdict::Unsatisfied);
    assert!(worklist.was_complete());
}

#[test]
fn the_deadlock_trace_replays() {
    let net = philosophers();
    let query = Condition::ExistsFinally(Box::new(Condition::Deadlock));
    let settings = SearchSettings {
        record_trace: true,
        ..SearchSettings::default()
    };
    let mut worklist = Worklist::new(&net, &query, &settings).unwrap();
    assert_eq!(worklist.check(), Verdict::Satisfied);

    // the only deadlock: every philosopher holds exactly a left fork
    let witness = worklist.counter_example_id().unwrap();
    let steps = worklist.trace_to(witness).unwrap();
    assert_eq!(steps.len(), 5);
    for step in &steps {
        assert_eq!(net.transition(step.transition).name, "take_left");
    }

    let generator = SuccessorGenerator::new(&net, GeneratorMode::Fixed);
    let mut marking = net.initial_marking().clone();
    for step in &steps {
        assert!(generator.is_fireable(&marking, step.transition));
        marking = generator.fire(&marking, step.transition, step.binding);
    }
    assert_eq!(marking.total_tokens(), 5);
    assert!(!generator.has_enabled(&marking));
}

/// Three colored tokens, a guard letting only the first one through.
fn guarded_hop() -> ColoredNet {
    let mut builder = NetBuilder::new();
    builder.add_color_type("c3");
    for color in ["r", "g", "b"] {
        builder.add_to_color_type("c3", color);
    }
    builder.add_variable("x", "c3");
    builder.add_place(
        "src",
        &["c3"],
        vec![
            TokenDecl::new(&["r"], 1),
            TokenDecl::new(&["g"], 1),
            TokenDecl::new(&["b"], 1),
        ],
    );
    builder.add_place("dst", &["c3"], vec![]);
    builder.add_transition(
        "hop",
        Some(GuardExpression::LessThan {
            lhs: ColorExpression::var("x"),
            rhs: ColorExpression::color("c3", "g"),
        }),
    );
    builder.add_input_arc("src", "hop", single_var("x"));
    builder.add_output_arc("hop", "dst", single_var("x"));
    builder.build().unwrap()
}

#[test]
fn guards_limit_the_reachable_space() {
    let net = guarded_hop();
    let query = Condition::AlwaysGlobally(Box::new(Condition::LessThanOrEqual(
        tokens_in("dst"),
        CountExpression::Literal(1),
    )));
    for mode in [
        GeneratorMode::Fixed,
        GeneratorMode::Even,
        GeneratorMode::Constrained,
    ] {
        let settings = SearchSettings {
            mode,
            ..SearchSettings::default()
        };
        let mut worklist = Worklist::new(&net, &query, &settings).unwrap();
        assert_eq!(worklist.check(), Verdict::Satisfied, "{mode}");
        assert_eq!(worklist.statistics().explored_states, 2, "{mode}");
        assert!(worklist.was_complete());
    }
}

fn hop_model() -> NetModel {
    NetModel {
        color_types: vec![ColorTypeModel {
            name: "c3".to_owned(),
            colors: vec!["r".to_owned(), "g".to_owned(), "b".to_owned()],
        }],
        variables: vec![VariableModel {
            name: "x".to_owned(),
            color_type: "c3".to_owned(),
        }],
        places: vec![
            PlaceModel {
                name: "src".to_owned(),
                color_types: vec!["c3".to_owned()],
                initial: vec![
                    TokenDecl::new(&["r"], 1),
                    TokenDecl::new(&["g"], 1),
                    TokenDecl::new(&["b"], 1),
                ],
            },
            PlaceModel {
                name: "dst".to_owned(),
                color_types: vec!["c3".to_owned()],
                initial: vec![],
            },
        ],
        transitions: vec![TransitionModel {
            name: "hop".to_owned(),
            guard: Some(GuardExpression::LessThan {
                lhs: ColorExpression::var("x"),
                rhs: ColorExpression::color("c3", "g"),
            }),
        }],
        input_arcs: vec![ArcModel {
            place: "src".to_owned(),
            transition: "hop".to_owned(),
            expression: single_var("x"),
        }],
        output_arcs: vec![ArcModel {
            place: "dst".to_owned(),
            transition: "hop".to_owned(),
            expression: single_var("x"),
        }],
        inhibitor_arcs: vec![],
        queries: vec![QueryModel {
            name: "one-hop".to_owned(),
            condition: Condition::AlwaysGlobally(Box::new(Condition::LessThanOrEqual(
                tokens_in("dst"),
                CountExpression::Literal(1),
            ))),
        }],
    }
}

#[test]
fn a_model_survives_the_disk_and_checks_out() {
    let path = std::env::temp_dir().join(format!("cpn-hop-{}.json", std::process::id()));
    let path = path.to_str().unwrap().to_owned();

    let model = hop_model();
    io::write_model(&path, &model).unwrap();
    let mut loaded = io::read_model(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, model);

    let queries = std::mem::take(&mut loaded.queries);
    let net = loaded.into_builder().build().unwrap();
    let mut worklist =
        Worklist::new(&net, &queries[0].condition, &SearchSettings::default()).unwrap();
    assert_eq!(worklist.check(), Verdict::Satisfied);
    assert_eq!(worklist.statistics().explored_states, 2);
}
