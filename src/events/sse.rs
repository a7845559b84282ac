use super::RunEvent;

/// Renders one Server-Sent-Events block for a run event: an `event:` field
/// naming the event type and a `data:` field carrying the JSON-encoded
/// event, terminated by a blank line.
pub fn sse_block(event: &RunEvent) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string(event)?;
    Ok(format!(
        "event: {}\ndata: {}\n\n",
        event.kind.event_type(),
        data
    ))
}
