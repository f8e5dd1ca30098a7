//! Strata AQL - range-condition algebra for the Strata query optimizer.
//!
//! This crate provides:
//!
//! - `ast`: the expression arena filter conditions and runtime bounds live in
//! - `range`: bounds, ranges, their AND/OR combinators and OR-branch pruning
//! - `optimizer`: range extraction from filter expressions
//!
//! # Example
//!
//! ```rust
//! use strata_aql::ast::{Ast, BinaryOp};
//! use strata_aql::optimizer::{index_or_condition, RangeAnalyzer};
//!
//! let mut ast = Ast::new();
//! let age = ast.attribute_path("u", "age");
//! let low = ast.value(18);
//! let lower = ast.binary(BinaryOp::Ge, age, low);
//! let age = ast.attribute_path("u", "age");
//! let high = ast.value(65);
//! let upper = ast.binary(BinaryOp::Le, age, high);
//! let filter = ast.binary(BinaryOp::And, lower, upper);
//!
//! let ranges = RangeAnalyzer::new(&ast).analyze(filter).unwrap().unwrap();
//! let condition = index_or_condition(&ranges, "u", &["age"]).unwrap();
//! assert_eq!(condition.len(), 1);
//! assert!(condition[0][0].is_constant());
//! ```

#![no_std]

extern crate alloc;

pub mod ast;
pub mod optimizer;
pub mod range;
