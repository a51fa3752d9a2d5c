use super::item::ItemId;

/// 批次中的一条评论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub identity: ItemId,
    pub text: String,
}

/// 一起提交分类的一组评论
///
/// 索引是批次内位置（从 0 开始），只在本批次的处理周期内有意义。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn new(entries: Vec<BatchEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// 批次索引 → 标识
    pub fn identity_at(&self, index: usize) -> Option<&ItemId> {
        self.entries.get(index).map(|entry| &entry.identity)
    }

    pub fn identities(&self) -> Vec<ItemId> {
        self.entries.iter().map(|entry| entry.identity.clone()).collect()
    }

    /// 按批次顺序的正文，作为分类请求的索引基准
    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.text.clone()).collect()
    }
}
