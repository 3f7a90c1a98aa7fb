use crate::config::ConfigError;

/// Window size and overlap, both counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHUNK_SIZE".to_string(),
                value: "0".to_string(),
            });
        }
        if overlap >= chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                size: chunk_size,
                overlap,
            });
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            overlap: 500,
        }
    }
}

/// Splits `text` into windows of at most `chunk_size` characters. Each window
/// starts `overlap` characters before the previous one ended. A window that
/// does not reach the end of the text is cut at the last whitespace in its
/// second half, if there is one.
pub fn split_into_chunks(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + config.chunk_size).min(total);

        if end < total {
            let floor = start + config.chunk_size / 2;
            if let Some(cut) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                if cut > start {
                    end = cut;
                }
            }
        }

        let chunk = &text[offsets[start]..offsets[end]];
        if !chunk.trim().is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= total {
            break;
        }
        start = end.saturating_sub(config.overlap).max(start + 1);
    }

    chunks
}
