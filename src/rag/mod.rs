pub mod rag;

pub use rag::{ format_context, RetrievalError, RetrievalSettings, RetrievedDocument, Retriever };
