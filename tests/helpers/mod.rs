// ==========================================
// 集成测试辅助模块
// ==========================================

pub mod memory_store;
