//! 帧装配器
//!
//! 把任意切分的原始字节块重组为完整的换行分隔文本记录：
//! - 块可以在记录中间断开，也可以一个块包含多条记录
//! - 残留的尾部字节跨调用保留，拼到下一个块前面
//! - 流结束时冲刷最后一条没有换行结尾的记录
//!
//! 装配器只负责切分，不解析记录内容。

use bytes::BytesMut;

/// 换行分隔记录装配器
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: BytesMut,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推入一个原始字节块，返回其中所有完整的记录行
    ///
    /// 返回的记录不含换行符；`\r\n` 结尾的记录会去掉 `\r`。
    /// 非法 UTF-8 字节按替换字符处理，交由上层的按记录解码去拒绝。
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut records = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            records.push(String::from_utf8_lossy(&line[..end]).into_owned());
        }
        records
    }

    /// 流结束时冲刷缓冲的残留记录
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split();
        let mut end = line.len();
        if end > 0 && line[end - 1] == b'\r' {
            end -= 1;
        }
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// 当前缓冲的未完成记录字节数
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}
