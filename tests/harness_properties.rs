mod common;

use pretty_assertions::assert_eq;
use scopesnap::{
    compare, compare_tokens, token::check_coverage, Comparison, Grammar, GrammarRegistry,
    HarnessConfig, Harness, Mode, ScopeName, Snapshot, Token, Tokenizer, TokenizerLimits,
};

use common::{Workspace, GO_GRAMMAR};

const SAMPLES: &[&str] = &[
    "package main",
    "",
    "package main\n\nimport \"fmt\"\n\nfunc main() {\n\t// say hi\n\tfmt.Println(\"hi\\t\\\"there\\\"\")\n\treturn 42\n}\n",
    "\"unterminated string\nfunc",
    "// only a comment",
    "héllo wörld 日本 \"ünïcode\"",
];

fn registry() -> GrammarRegistry {
    let mut registry = GrammarRegistry::new();
    registry.insert(Grammar::from_yaml(GO_GRAMMAR, "go.yaml").unwrap()).unwrap();
    registry
}

fn tokenizer() -> Tokenizer {
    Tokenizer::for_grammar(&registry(), "go", TokenizerLimits::default()).unwrap()
}

#[test]
fn package_main_yields_keyword_then_identifier() {
    let tokenization = scopesnap::tokenize(&registry(), "go", "package main").unwrap();
    let significant: Vec<(usize, usize, String)> = tokenization
        .significant()
        .map(|t| (t.start, t.end, t.scope_list()))
        .collect();
    assert_eq!(
        significant,
        vec![(0, 7, "keyword".to_string()), (8, 12, "identifier".to_string())]
    );
}

#[test]
fn example_mismatch_is_reported_at_index_one() {
    let fresh = scopesnap::tokenize(&registry(), "go", "package main").unwrap();
    let stored = vec![
        Token::new(0, 7, vec![ScopeName::parse("keyword").unwrap()]),
        Token::new(8, 12, vec![ScopeName::parse("keyword").unwrap()]),
    ];

    let Comparison::Mismatch(mismatch) = compare_tokens(&stored, fresh.significant()) else {
        panic!("expected a mismatch");
    };
    assert_eq!(mismatch.index, 1);
    assert_eq!(mismatch.diverging, 1);

    let matching: Vec<Token> = fresh.significant().cloned().collect();
    assert!(compare_tokens(&matching, fresh.significant()).is_match());
}

#[test]
fn tokenizing_twice_is_deterministic() {
    let tokenizer = tokenizer();
    for sample in SAMPLES {
        let first = tokenizer.tokenize("sample", sample).unwrap();
        let second = tokenizer.tokenize("sample", sample).unwrap();
        assert_eq!(first, second, "sample {sample:?}");
    }
}

#[test]
fn full_tokenizations_cover_the_text() {
    let tokenizer = tokenizer();
    for sample in SAMPLES {
        let tokenization = tokenizer.tokenize("sample", sample).unwrap();
        assert_eq!(
            check_coverage(tokenization.tokens(), sample.len()),
            Ok(()),
            "sample {sample:?}"
        );
    }
}

#[test]
fn snapshots_survive_serialization() {
    let tokenizer = tokenizer();
    for sample in SAMPLES {
        let tokenization = tokenizer.tokenize("sample", sample).unwrap();
        let snapshot = Snapshot::capture("go", sample, tokenization.tokens());
        let parsed = Snapshot::parse(&snapshot.serialize()).unwrap();
        assert_eq!(parsed.to_tokens(), tokenization.into_significant());
        assert!(compare(&parsed, &snapshot).comparison.is_match());
    }
}

#[test]
fn update_then_run_passes_for_every_sample() {
    let ws = Workspace::new();
    for (i, sample) in SAMPLES.iter().enumerate() {
        ws.write(&format!("fixtures/sample{i}.go"), sample);
    }
    let config = HarnessConfig::load(Some(ws.path("scopesnap.yaml").as_path())).unwrap();
    let harness = Harness::new(config).unwrap();

    let updated = harness.run(Mode::Update, None).unwrap();
    assert_eq!(updated.failed(), 0);
    assert_eq!(updated.total(), SAMPLES.len());

    let checked = harness.run(Mode::Check, None).unwrap();
    assert!(checked.is_success());
    assert_eq!(checked.passed(), SAMPLES.len());
}
