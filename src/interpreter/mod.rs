// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The interpreter
//!
//! [`generator`] lowers RAM statements into the executable [`shadow`]
//! tree; [`engine`] walks that tree to fixpoint, threading all mutable
//! evaluation state through a per-invocation [`context`]. User operators
//! dispatch through the [`functors`] registry.

pub mod context;
pub mod engine;
pub mod functors;
pub mod generator;
pub mod regex_cache;
pub mod shadow;

pub use context::Context;
pub use engine::{Engine, EngineBuilder};
pub use functors::{
    FunctorArg, FunctorHandle, FunctorRegistry, FunctorResult, StatefulFunctor, StatelessFunctor,
};
pub use regex_cache::RegexCache;
pub use shadow::{ShadowNode, SuperInstruction, ViewContext, ViewInfo};
