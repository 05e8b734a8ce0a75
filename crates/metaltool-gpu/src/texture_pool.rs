//! Idle texture pool for efficient texture reuse.
//!
//! Avoids allocating/deallocating GPU textures per frame by keeping idle
//! textures keyed by (width, height, format) under a memory budget.

use std::collections::HashMap;

/// Key for pooled textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl TextureKey {
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }
}

/// Something the pool can hold.
pub trait PooledResource {
    fn pool_key(&self) -> TextureKey;
    fn memory_size(&self) -> usize;
}

/// Pool of reusable idle textures.
pub struct TexturePool<T> {
    /// Available (free) textures, keyed by dimensions + format.
    free: HashMap<TextureKey, Vec<T>>,
    /// Total memory used by all pooled textures.
    total_memory: usize,
    /// Maximum memory budget for the pool.
    max_memory: usize,
}

impl<T: PooledResource> TexturePool<T> {
    /// Create a new texture pool with the given memory budget.
    pub fn new(max_memory: usize) -> Self {
        Self {
            free: HashMap::new(),
            total_memory: 0,
            max_memory,
        }
    }

    /// Take an idle texture matching `key`, or build one with `create`.
    pub fn acquire(&mut self, key: TextureKey, create: impl FnOnce(TextureKey) -> T) -> T {
        if let Some(textures) = self.free.get_mut(&key) {
            if let Some(tex) = textures.pop() {
                self.total_memory = self.total_memory.saturating_sub(tex.memory_size());
                if textures.is_empty() {
                    self.free.remove(&key);
                }
                return tex;
            }
        }

        create(key)
    }

    /// Return a texture to the pool for reuse.
    ///
    /// Returns `false` when the texture was dropped to stay within budget.
    pub fn release(&mut self, texture: T) -> bool {
        let mem = texture.memory_size();

        if self.total_memory + mem > self.max_memory {
            return false;
        }

        self.total_memory += mem;
        self.free.entry(texture.pool_key()).or_default().push(texture);
        true
    }

    /// Total memory used by pooled (free) textures.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Number of textures in the pool.
    pub fn texture_count(&self) -> usize {
        self.free.values().map(|v| v.len()).sum()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    /// Clear all pooled textures.
    pub fn clear(&mut self) {
        self.free.clear();
        self.total_memory = 0;
    }

    /// Drop idle textures until memory is at or below `target_memory`.
    ///
    /// Sizes with the most idle textures lose one first.
    pub fn evict_to(&mut self, target_memory: usize) {
        while self.total_memory > target_memory {
            let key = self
                .free
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .max_by_key(|(_, v)| v.len())
                .map(|(k, _)| *k);

            let Some(key) = key else {
                break;
            };
            if let Some(textures) = self.free.get_mut(&key) {
                if let Some(tex) = textures.pop() {
                    self.total_memory = self.total_memory.saturating_sub(tex.memory_size());
                }
                if textures.is_empty() {
                    self.free.remove(&key);
                }
            }
        }
    }
}
