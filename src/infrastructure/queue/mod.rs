mod in_memory_queue;
mod redis_stream_queue;

pub use in_memory_queue::InMemoryJobQueue;
pub use redis_stream_queue::RedisStreamQueue;
