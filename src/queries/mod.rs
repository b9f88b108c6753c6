pub mod accounts;
pub mod leetcode;
pub mod telegram;
