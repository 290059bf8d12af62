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

//! # Lumen Render
//!
//! The render side of the engine core.
//!
//! The simulation thread edits an [`AssetContext`] and calls
//! [`AssetContext::sync`]; the resource managers turn every component change
//! into [`RenderCommand`](queue::RenderCommand)s. The render thread owns a
//! [`RenderContext`] and a [`FrameDriver`](frame::FrameDriver) which executes
//! those commands, uploads cameras, lights and instance transforms, clusters
//! the lights for every camera and runs the render passes.

#![warn(missing_docs)]

pub mod camera;
pub mod config;
pub mod context;
pub mod frame;
pub mod light;
pub mod managers;
pub mod mesh;
pub mod queue;

pub use config::{ClusterConfig, DeferralPolicy, FrameRate, RenderConfig};
pub use context::{AssetContext, RenderContext, Viewport};
pub use frame::{FrameDriver, FrameStats, RenderThread};
pub use queue::{command_channel, RenderCommandQueue, RenderCommandSender};
