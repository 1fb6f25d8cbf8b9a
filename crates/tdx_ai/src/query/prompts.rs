pub fn context_qa_prompt(context: &str, question: &str) -> String {
    format!(
        r#"Context information from the source table is below. Each block is one record.
---------------------
{context}
---------------------
Given the context information and not prior knowledge, answer the query.
If the records do not contain enough information, say so plainly.
Query: {question}
Answer: "#
    )
}
