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

//! # Frame driving
//!
//! One render frame runs, in order:
//!
//! 1. the pending render commands ([`crate::queue::RenderCommandQueue::execute`]),
//! 2. camera parameter uploads,
//! 3. the light library and instance buffer flushes,
//! 4. light clustering for every loaded camera,
//! 5. the registered [`RenderPass`]es, in registration order.
//!
//! [`FrameDriver`] performs one frame; [`RenderThread`] owns a driver on a
//! dedicated thread and paces it with a [`TickLoop`].

mod driver;
mod passes;
mod thread;
mod tick;

pub use driver::{FrameDriver, FrameStats};
pub use passes::{DepthPrepass, FinishPass, ForwardPass, RenderPass, RenderTarget};
pub use thread::RenderThread;
pub use tick::TickLoop;
