/// 定长循环队列，满时覆盖最旧的元素
///
/// 用于缓存 RMT 接收到的帧。容量在运行时确定（由接收缓冲区大小换算而来）
#[derive(Debug)]
pub struct CircularQueue<T> {
    buffer: Vec<Option<T>>,
    head: usize, // 队头位置（出队）
    len: usize,
}

impl<T> CircularQueue<T> {
    /// 创建指定容量的空队列，容量至少为 1
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buffer = Vec::with_capacity(capacity.max(1));
        buffer.resize_with(capacity.max(1), || None);
        Self {
            buffer,
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// 向队尾添加元素，队列已满时覆盖最旧的元素
    ///
    /// # 返回值
    /// - `None` - 队列未满，直接添加
    /// - `Some(old_value)` - 队列已满，返回被覆盖的旧值
    pub fn push_overwrite(&mut self, value: T) -> Option<T> {
        let tail = (self.head + self.len) % self.capacity();
        if self.is_full() {
            let old = self.buffer[self.head].replace(value);
            self.head = (self.head + 1) % self.capacity();
            old
        } else {
            self.buffer[tail] = Some(value);
            self.len += 1;
            None
        }
    }

    /// 从队头移除并返回元素
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.buffer[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        value
    }

    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            self.buffer[self.head].as_ref()
        }
    }

    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}
