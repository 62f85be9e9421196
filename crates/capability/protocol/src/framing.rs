//! 行分帧
//!
//! 把任意分块到达的字节流重组为协议行。一行以第一个 CR/LF 结束，
//! 紧随其后的连续 CR/LF 一并消费，空行被丢弃，未结束的尾部保留到下次。

use tracing::warn;

/// 默认最大未结束行长度（字节）
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// 行缓冲区
#[derive(Debug, Clone)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_line_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// 指定最大未结束行长度；超过后未结束的数据会被丢弃
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line_len,
        }
    }

    /// 追加读到的数据块
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// 取出下一整行（不含行结束符）
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(end) = self.buf.iter().position(|b| is_terminator(*b)) else {
                if self.buf.len() > self.max_line_len {
                    warn!(
                        target: "otgw.protocol",
                        pending = self.buf.len(),
                        max = self.max_line_len,
                        "line_too_long_discarded"
                    );
                    self.buf.clear();
                }
                return None;
            };

            let consumed = end
                + self.buf[end..]
                    .iter()
                    .take_while(|b| is_terminator(**b))
                    .count();
            let line: Vec<u8> = self.buf.drain(..consumed).take(end).collect();
            if line.is_empty() {
                continue;
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// 清空缓冲区（重连时丢弃残留数据）
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}
