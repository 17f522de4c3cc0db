//! Verification key model and flattening.
//!
//! A key document is parsed into a tagged tree (`VkNode`) checked against
//! the fixed shape of each field, then flattened depth-first in the order
//! `alpha, beta, gamma, delta, gammaABC`. The verifier contract reads the
//! flat array positionally, so the order is part of the wire format.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::value::RawValue;
use serde_json::Value;

use dexboot_core::{parse_u256, Token, U256};

use crate::{Result, VerifierError};

/// Structural node of a verification key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VkNode {
    /// Finite-field element
    Scalar(U256),
    /// Two-element group coordinate (or pair of coordinates)
    Pair(Box<VkNode>, Box<VkNode>),
    /// Variable-length sequence
    Seq(Vec<VkNode>),
}

impl VkNode {
    /// Depth-first, left-to-right; scalars appended as-is.
    fn flatten_into(&self, out: &mut Vec<U256>) {
        match self {
            VkNode::Scalar(value) => out.push(*value),
            VkNode::Pair(first, second) => {
                first.flatten_into(out);
                second.flatten_into(out);
            }
            VkNode::Seq(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
        }
    }

    /// Number of scalar leaves
    pub fn leaf_count(&self) -> usize {
        match self {
            VkNode::Scalar(_) => 1,
            VkNode::Pair(a, b) => a.leaf_count() + b.leaf_count(),
            VkNode::Seq(items) => items.iter().map(VkNode::leaf_count).sum(),
        }
    }
}

/// Expected shape of a key field, fixed by the proving system
#[derive(Debug)]
pub enum Shape {
    Scalar,
    Pair(&'static Shape),
    Seq(&'static Shape),
}

/// A single field element
pub const FIELD: Shape = Shape::Scalar;
/// G1 point: (x, y)
pub const G1: Shape = Shape::Pair(&FIELD);
/// G2 point: ((x0, x1), (y0, y1))
pub const G2: Shape = Shape::Pair(&G1);
/// Input commitments: one G1 point per public input, plus one
pub const G1_SEQ: Shape = Shape::Seq(&G1);

/// Nodes are read from raw JSON text so that integer literals wider than
/// 64 bits keep every digit.
fn parse_node(raw: &RawValue, shape: &Shape, path: &str) -> Result<VkNode> {
    let malformed = |reason: String| VerifierError::MalformedVerificationKey {
        field: path.to_string(),
        reason,
    };
    let text = raw.get();

    match shape {
        Shape::Scalar => {
            let value = match kind(text) {
                "string" => {
                    let s: String = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
                    parse_u256(&s).map_err(|e| malformed(e.to_string()))?
                }
                "number" => {
                    parse_u256(text.trim()).map_err(|_| malformed(format!("not an unsigned integer: {}", text)))?
                }
                other => return Err(malformed(format!("expected field element, got {}", other))),
            };
            Ok(VkNode::Scalar(value))
        }
        Shape::Pair(inner) => {
            let items = elements(text, "pair").map_err(malformed)?;
            if items.len() != 2 {
                return Err(malformed(format!("expected 2 elements, got {}", items.len())));
            }
            Ok(VkNode::Pair(
                Box::new(parse_node(items[0], inner, &format!("{}[0]", path))?),
                Box::new(parse_node(items[1], inner, &format!("{}[1]", path))?),
            ))
        }
        Shape::Seq(inner) => {
            let items = elements(text, "sequence").map_err(malformed)?;
            if items.is_empty() {
                return Err(malformed("empty sequence".to_string()));
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_node(item, inner, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(VkNode::Seq)
        }
    }
}

fn elements<'a>(text: &'a str, expected: &str) -> std::result::Result<Vec<&'a RawValue>, String> {
    match kind(text) {
        "array" => serde_json::from_str(text).map_err(|e| e.to_string()),
        other => Err(format!("expected {}, got {}", expected, other)),
    }
}

/// JSON type of a raw value, from its first character
fn kind(text: &str) -> &'static str {
    match text.trim_start().as_bytes().first() {
        Some(b'"') => "string",
        Some(b'[') => "array",
        Some(b'{') => "object",
        Some(b't') | Some(b'f') => "bool",
        Some(b'n') => "null",
        _ => "number",
    }
}

/// Structured Groth16 verification key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    pub alpha: VkNode,
    pub beta: VkNode,
    pub gamma: VkNode,
    pub delta: VkNode,
    pub gamma_abc: VkNode,
}

impl VerificationKey {
    /// Document field names with their shapes, in flattening order
    pub const FIELDS: [(&'static str, &'static Shape); 5] = [
        ("alpha", &G1),
        ("beta", &G2),
        ("gamma", &G2),
        ("delta", &G2),
        ("gammaABC", &G1_SEQ),
    ];

    pub fn from_json(doc: &Value) -> Result<Self> {
        Self::from_json_str(&doc.to_string())
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let document_error = |reason: String| VerifierError::MalformedVerificationKey {
            field: "<document>".to_string(),
            reason,
        };
        if kind(text) != "object" {
            // still surfaces syntax errors ahead of the type mismatch
            serde_json::from_str::<&RawValue>(text).map_err(|e| document_error(e.to_string()))?;
            return Err(document_error(format!("expected object, got {}", kind(text))));
        }
        let object: BTreeMap<String, &RawValue> =
            serde_json::from_str(text).map_err(|e| document_error(e.to_string()))?;

        let field = |name: &str, shape: &Shape| -> Result<VkNode> {
            let raw = object.get(name).ok_or_else(|| VerifierError::MalformedVerificationKey {
                field: name.to_string(),
                reason: "missing".to_string(),
            })?;
            parse_node(raw, shape, name)
        };

        let [alpha, beta, gamma, delta, gamma_abc] = Self::FIELDS;
        Ok(Self {
            alpha: field(alpha.0, alpha.1)?,
            beta: field(beta.0, beta.1)?,
            gamma: field(gamma.0, gamma.1)?,
            delta: field(delta.0, delta.1)?,
            gamma_abc: field(gamma_abc.0, gamma_abc.1)?,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| VerifierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|e| e.in_file(path))
    }

    /// Fields in flattening order. This order is the contract with the
    /// verifier; do not reorder.
    pub fn fields(&self) -> [&VkNode; 5] {
        [&self.alpha, &self.beta, &self.gamma, &self.delta, &self.gamma_abc]
    }

    /// Number of public inputs the key supports
    pub fn public_inputs(&self) -> usize {
        match &self.gamma_abc {
            VkNode::Seq(points) => points.len().saturating_sub(1),
            _ => 0,
        }
    }
}

/// Flat, ordered field elements as the verifier's registration call expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedVerificationKey(Vec<U256>);

impl FlattenedVerificationKey {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[U256] {
        &self.0
    }

    /// As the fixed-size `uint256[N]` argument of `registerCircuit`
    pub fn to_token(&self) -> Token {
        Token::FixedArray(self.0.iter().copied().map(Token::Uint).collect())
    }
}

impl From<Vec<U256>> for FlattenedVerificationKey {
    fn from(elements: Vec<U256>) -> Self {
        Self(elements)
    }
}

/// Flatten a key. Pure: the same key always yields the same sequence.
pub fn flatten(vk: &VerificationKey) -> FlattenedVerificationKey {
    let mut out = Vec::with_capacity(vk.fields().iter().map(|f| f.leaf_count()).sum());
    for node in vk.fields() {
        node.flatten_into(&mut out);
    }
    FlattenedVerificationKey(out)
}
