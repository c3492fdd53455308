//! Canonical descriptors
//!
//! A descriptor is the structural identity of a node: its kind, its rendered
//! parameters and the descriptors of its operands, nested in order. Two
//! requests with the same descriptor always resolve to the same node.

use crate::operation::Operation;

/// Build the descriptor for `op` applied to operands with the given descriptors
///
/// Format: `kind(params)` for leaves and `kind(params){d0,d1,..}` otherwise.
pub fn compute_descriptor<S: AsRef<str>>(op: &Operation, operand_descriptors: &[S]) -> String {
    let params = op.describe_params();
    let mut descriptor = String::with_capacity(
        op.type_name().len()
            + params.len()
            + 4
            + operand_descriptors
                .iter()
                .map(|d| d.as_ref().len() + 1)
                .sum::<usize>(),
    );
    descriptor.push_str(op.type_name());
    descriptor.push('(');
    descriptor.push_str(&params);
    descriptor.push(')');

    if !operand_descriptors.is_empty() {
        descriptor.push('{');
        for (i, d) in operand_descriptors.iter().enumerate() {
            if i > 0 {
                descriptor.push(',');
            }
            descriptor.push_str(d.as_ref());
        }
        descriptor.push('}');
    }
    descriptor
}

/// Short printable key for logs
pub fn short_key(descriptor: &str) -> String {
    let hash = blake3::hash(descriptor.as_bytes()).to_hex();
    hash.as_str()[..12].to_string()
}
