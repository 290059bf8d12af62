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

//! Typed wrappers around native GPU object names.
//!
//! OpenGL names every object with a `u32` and reserves `0` for "no object".
//! Wrapping each kind in its own type keeps a texture name from ever being
//! passed where a buffer is expected.

use std::fmt;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// The reserved "no object" name.
            pub const NONE: Self = Self(0);

            /// Returns `true` if this handle names a live object.
            #[inline]
            pub const fn is_valid(&self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

gpu_handle!(
    /// A GPU buffer object.
    BufferHandle
);
gpu_handle!(
    /// A texture object, including texture buffers.
    TextureHandle
);
gpu_handle!(
    /// A linked shader program.
    ProgramHandle
);
gpu_handle!(
    /// A framebuffer object.
    FramebufferHandle
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_valid() {
        assert!(!BufferHandle::NONE.is_valid());
        assert!(TextureHandle(7).is_valid());
        assert_eq!(ProgramHandle::default(), ProgramHandle::NONE);
        assert_eq!(FramebufferHandle(3).to_string(), "FramebufferHandle(3)");
    }
}
