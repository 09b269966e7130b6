//! End-to-end compiler tests: source text in, CompilationResult out.

use aegis_common::{ErrorCategory, Program};
use aegis_compiler::{compile, convert_to_ast, generate_bytecode, parse, tokenize, Compiler, CompilerLimits};

fn error_categories(source: &str) -> Vec<ErrorCategory> {
    compile(source).errors.iter().map(|e| e.category).collect()
}

// ============================================================
// Pipeline
// ============================================================

#[test]
fn canonical_program_roundtrip_is_byte_identical() {
    let source = "qudit q 2\ncontract bot\nexplain bot 0.9\n";
    let limits = CompilerLimits::default();
    let render = || {
        let parsed = parse(&tokenize(source, &limits).tokens, &limits);
        generate_bytecode(&parsed.instructions).join("\n")
    };
    let first = render();
    for _ in 0..5 {
        assert_eq!(render(), first);
    }
    assert_eq!(
        first,
        "ALLOC_QUDIT q 2\nDECLARE_CONTRACT bot\nSET_EXPLAINABILITY bot 0.9"
    );

    let a = compile(source);
    let b = compile(source);
    assert!(a.success);
    assert_eq!(a.digest, b.digest);
    assert_eq!(a.program.to_text(), Program::from_text(&a.program.to_text()).unwrap().to_text());
}

#[test]
fn punctuation_style_is_equivalent() {
    let plain = compile("qudit a 2\nqudit b 2\nentangle a b\nmeasure a\n");
    let styled = compile("qudit(a, 2);\nqudit(b, 2);\nentangle(a, b);\nmeasure(a);\n");
    assert!(plain.success && styled.success);
    assert_eq!(plain.bytecode, styled.bytecode);
}

#[test]
fn every_keyword_compiles_in_one_program() {
    let source = r#"
        # resources
        qudit a 2
        qudit b 2
        qudit c 3
        qudit d 2
        entangle a b
        apply hadamard a
        disentangle a b
        swap c d
        entangle_remote c node_b
        // governance
        contract bot
        explain bot 0.9
        oversee bot approval
        classify bot high
        approve bot
        verify bot
        deploy bot staging
        decide bot allocate
        let label "demo run"
        print label
        node node_b
        channel quantum_link
        barrier sync 500
        window batch 100 200
        teleport d node_b
        measure a
        release b
        measure c
    "#;
    let result = compile(source);
    assert!(result.success, "{:#?}", result.errors);
    assert_eq!(result.bytecode.len(), 27);
    assert!(result.bytecode.contains(&"LET label \"demo run\"".to_string()));
}

#[test]
fn ast_nodes_follow_instruction_order() {
    let source = "contract bot\nqudit a 2\nmeasure a";
    let limits = CompilerLimits::default();
    let parsed = parse(&tokenize(source, &limits).tokens, &limits);
    let nodes = convert_to_ast(&parsed.instructions, source);
    let lines: Vec<usize> = nodes.iter().map(|n| n.location.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

// ============================================================
// Safety laws
// ============================================================

#[test]
fn no_cloning_blocks_bytecode() {
    let result = compile("qudit a 2\nmeasure a\nrelease a\n");
    assert!(!result.success);
    assert!(result.bytecode.is_empty());
    assert!(result
        .errors
        .iter()
        .all(|e| e.category == ErrorCategory::QuantumViolation));
}

#[test]
fn threshold_law() {
    assert_eq!(
        error_categories("contract bot\nexplain bot 0.7\n"),
        vec![ErrorCategory::AiSafety]
    );
    assert!(compile("contract bot\nexplain bot 0.85\n").success);
    assert!(compile("contract bot\nexplain bot 0.7\noversee bot supervision\n").success);
}

#[test]
fn criticality_law() {
    for level in ["high", "critical", "safety"] {
        let failing = format!("contract bot\nclassify bot {level}\noversee bot none\n");
        assert_eq!(error_categories(&failing), vec![ErrorCategory::AiSafety]);
        for oversight in ["approval", "control"] {
            let passing = format!("contract bot\nclassify bot {level}\noversee bot {oversight}\n");
            assert!(compile(&passing).success, "{level}/{oversight}");
        }
    }
}

#[test]
fn unresolved_reference_fails_compilation() {
    let result = compile("print missing\n");
    assert!(!result.success);
    assert_eq!(result.errors[0].category, ErrorCategory::Type);
    assert!(result.types[0].is_unknown());
    assert!(result.errors[0].suggestion.is_some());
}

#[test]
fn high_risk_deploy_compiles() {
    let result = compile("contract bot\noversee bot none\ndeploy bot high-risk-zone\n");
    assert!(result.success, "{:#?}", result.errors);
}

#[test]
fn errors_carry_source_locations() {
    let result = compile("qudit a 2\n\n   measure b\n");
    assert_eq!(result.errors[0].location.line, 3);
    assert_eq!(result.errors[0].location.column, 4);
}

// ============================================================
// Ceilings
// ============================================================

#[test]
fn ten_thousand_unknown_tokens() {
    let source = "bogus ".repeat(10_001);
    let result = compile(&source);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.category == ErrorCategory::Performance));
    assert!(result.errors.iter().all(|e| !e.fatal));
    assert!(result.errors.is_empty());
    assert!(result.ast.is_empty());
    assert!(result.bytecode.is_empty());
    // Individual unknown-keyword warnings are capped.
    assert!(result.warnings.len() <= CompilerLimits::default().max_unknown_keyword_warnings + 2);
}

#[test]
fn oversized_source_fails() {
    let mut compiler = Compiler::new(CompilerLimits {
        max_source_bytes: 16,
        ..CompilerLimits::default()
    });
    let result = compiler.compile("qudit a 2\nqudit b 2\nqudit c 2\n");
    assert!(!result.success);
    assert_eq!(result.errors[0].category, ErrorCategory::Syntax);
}

#[test]
fn result_serializes_to_json() {
    let result = compile("qudit a 2\nmeasure a\n");
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["bytecode"][0], "ALLOC_QUDIT a 2");
}
