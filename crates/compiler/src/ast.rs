//! AST builder: parsed instructions → annotated syntax nodes.

use aegis_common::ast::DEFAULT_EXPLAINABILITY;
use aegis_common::{
    Criticality, Directive, EntityModifier, GovernedAction, Instruction, NodeKind, NodeMetadata,
    Opcode, OversightLevel, SyntaxNode, Value,
};
use std::collections::BTreeMap;

/// Build one node per instruction, in order.
///
/// `source` supplies the statement text recorded on each node.
pub fn convert_to_ast(instructions: &[Instruction], source: &str) -> Vec<SyntaxNode> {
    let lines: Vec<&str> = source.lines().collect();
    let partners = entanglement_partners(instructions);

    instructions
        .iter()
        .map(|instr| {
            let value = instr
                .location
                .line
                .checked_sub(1)
                .and_then(|idx| lines.get(idx))
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| instr.to_bytecode_line());
            SyntaxNode {
                kind: NodeKind::of(instr.opcode),
                opcode: instr.opcode,
                location: instr.location,
                value,
                metadata: metadata(instr, &partners),
            }
        })
        .collect()
}

/// Every name each resource is entangled with by an `entangle` statement.
fn entanglement_partners(instructions: &[Instruction]) -> BTreeMap<&str, Vec<String>> {
    let mut partners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for instr in instructions.iter().filter(|i| i.opcode == Opcode::Entangle) {
        let (a, b) = (instr.arg(0), instr.arg(1));
        for (from, to) in [(a, b), (b, a)] {
            let list = partners.entry(from).or_default();
            if !list.iter().any(|p| p == to) {
                list.push(to.to_string());
            }
        }
    }
    partners
}

fn operation(operands: &[&str], gate: Option<&str>, remote: Option<&str>, consuming: bool) -> NodeMetadata {
    NodeMetadata::Operation {
        operands: operands.iter().map(|s| s.to_string()).collect(),
        gate: gate.map(str::to_string),
        remote_node: remote.map(str::to_string),
        consuming,
    }
}

fn modifier(instr: &Instruction, modifier: EntityModifier) -> NodeMetadata {
    NodeMetadata::Modifier {
        entity: instr.arg(0).to_string(),
        modifier,
    }
}

fn parse_score(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|s| s.is_finite())
}

fn metadata(instr: &Instruction, partners: &BTreeMap<&str, Vec<String>>) -> NodeMetadata {
    let a0 = instr.arg(0);
    let a1 = instr.arg(1);
    let consuming = instr.opcode.is_consuming();

    match instr.opcode {
        Opcode::AllocQudit => NodeMetadata::Resource {
            name: a0.to_string(),
            dimension: a1.parse().ok(),
            partners: partners.get(a0).cloned().unwrap_or_default(),
        },
        Opcode::Entangle | Opcode::Disentangle | Opcode::EntanglementSwap => {
            operation(&[a0, a1], None, None, consuming)
        }
        Opcode::ApplyGate => operation(&[a1], Some(a0), None, consuming),
        Opcode::Measure | Opcode::Release => operation(&[a0], None, None, consuming),
        Opcode::EntangleRemote | Opcode::Teleport => operation(&[a0], None, Some(a1), consuming),
        Opcode::DeclareContract => NodeMetadata::Entity {
            name: a0.to_string(),
            explainability: DEFAULT_EXPLAINABILITY,
            oversight: OversightLevel::Notification,
            criticality: Criticality::Medium,
        },
        Opcode::SetExplainability => modifier(
            instr,
            EntityModifier::Explainability {
                score: parse_score(a1),
            },
        ),
        Opcode::SetOversight => modifier(
            instr,
            EntityModifier::Oversight {
                level: a1.parse().ok(),
            },
        ),
        Opcode::SetCriticality => modifier(
            instr,
            EntityModifier::Criticality {
                level: a1.parse().ok(),
            },
        ),
        Opcode::Approve => modifier(instr, EntityModifier::Approval),
        Opcode::Deploy => NodeMetadata::Governed {
            entity: a0.to_string(),
            action: GovernedAction::Deploy {
                target: a1.to_string(),
            },
        },
        Opcode::Verify => NodeMetadata::Governed {
            entity: a0.to_string(),
            action: GovernedAction::Verify,
        },
        Opcode::Decide => NodeMetadata::Decision {
            entity: a0.to_string(),
            action: a1.to_string(),
        },
        Opcode::Let => NodeMetadata::Literal {
            name: a0.to_string(),
            value: Value::parse_literal(a1),
        },
        Opcode::Print => NodeMetadata::Reference {
            name: a0.to_string(),
        },
        Opcode::SetTargetNode => NodeMetadata::Directive(Directive::TargetNode {
            node: a0.to_string(),
        }),
        Opcode::SetChannel => NodeMetadata::Directive(Directive::Channel {
            channel: a0.to_string(),
        }),
        Opcode::Barrier => NodeMetadata::Directive(Directive::Barrier {
            name: a0.to_string(),
            deadline_ms: a1.parse().ok(),
        }),
        Opcode::ScheduleWindow => NodeMetadata::Directive(Directive::Window {
            name: a0.to_string(),
            soft_ms: a1.parse().ok(),
            hard_ms: instr.arg(2).parse().ok(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::limits::CompilerLimits;
    use crate::parser::parse;

    fn ast(source: &str) -> Vec<SyntaxNode> {
        let limits = CompilerLimits::default();
        let parsed = parse(&tokenize(source, &limits).tokens, &limits);
        convert_to_ast(&parsed.instructions, source)
    }

    #[test]
    fn contract_defaults() {
        let nodes = ast("contract bot");
        assert_eq!(
            nodes[0].metadata,
            NodeMetadata::Entity {
                name: "bot".into(),
                explainability: 0.85,
                oversight: OversightLevel::Notification,
                criticality: Criticality::Medium,
            }
        );
        assert_eq!(nodes[0].kind, NodeKind::EntityDeclaration);
    }

    #[test]
    fn declarations_learn_partners() {
        let nodes = ast("qudit a 2\nqudit b 2\nentangle a b\nentangle b a");
        match &nodes[0].metadata {
            NodeMetadata::Resource {
                dimension, partners, ..
            } => {
                assert_eq!(*dimension, Some(2));
                assert_eq!(partners, &vec!["b".to_string()]);
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn uninterpretable_literals_become_none() {
        let nodes = ast("qudit a two\ncontract bot\nexplain bot high\noversee bot lots\nbarrier sync soon");
        assert!(matches!(
            nodes[0].metadata,
            NodeMetadata::Resource { dimension: None, .. }
        ));
        assert!(matches!(
            nodes[2].metadata,
            NodeMetadata::Modifier {
                modifier: EntityModifier::Explainability { score: None },
                ..
            }
        ));
        assert!(matches!(
            nodes[3].metadata,
            NodeMetadata::Modifier {
                modifier: EntityModifier::Oversight { level: None },
                ..
            }
        ));
        assert!(matches!(
            nodes[4].metadata,
            NodeMetadata::Directive(Directive::Barrier {
                deadline_ms: None,
                ..
            })
        ));
    }

    #[test]
    fn levels_parse_case_insensitively() {
        let nodes = ast("contract bot\noversee bot APPROVAL\nclassify bot High");
        assert!(matches!(
            nodes[1].metadata,
            NodeMetadata::Modifier {
                modifier: EntityModifier::Oversight {
                    level: Some(OversightLevel::Approval)
                },
                ..
            }
        ));
        assert!(matches!(
            nodes[2].metadata,
            NodeMetadata::Modifier {
                modifier: EntityModifier::Criticality {
                    level: Some(Criticality::High)
                },
                ..
            }
        ));
    }

    #[test]
    fn gate_and_remote_operands() {
        let nodes = ast("apply hadamard q\nteleport q node_b");
        assert_eq!(nodes[0].resource_operands(), &["q".to_string()]);
        assert!(matches!(
            &nodes[1].metadata,
            NodeMetadata::Operation { remote_node: Some(n), consuming: true, .. } if n == "node_b"
        ));
    }

    #[test]
    fn node_value_is_statement_text() {
        let nodes = ast("  qudit a 2   // first\nmeasure a");
        assert_eq!(nodes[0].value, "qudit a 2   // first");
        assert_eq!(nodes[1].value, "measure a");
    }
}
