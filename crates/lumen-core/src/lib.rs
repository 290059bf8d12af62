// Copyright 2025 eraflo
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

//! # Lumen Core
//!
//! Foundational crate of the Lumen renderer: math, GPU handle types, the
//! [`GraphicsDevice`](renderer::GraphicsDevice) contract, the uniform block
//! layout engine and the logical asset records shared by the simulation and
//! render threads.

#![warn(missing_docs)]

pub mod addon;
pub mod asset;
pub mod ecs;
pub mod event;
pub mod math;
pub mod renderer;
pub mod scene;
pub mod utils;

pub use addon::AddonRegistry;
pub use ecs::EntityId;
pub use event::EventBus;
pub use scene::Transform;
