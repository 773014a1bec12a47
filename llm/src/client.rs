use futures::stream::{self, Stream};
use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, pin::Pin};
use tracing::{event, instrument, Level};

/// Thin reqwest wrapper shared by providers.
#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

impl Client {
    pub fn new() -> Self {
        Client {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_headers(headers: HeaderMap) -> Self {
        Client {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to build headers"),
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get<U, T>(&self, url: U) -> anyhow::Result<T>
    where
        U: reqwest::IntoUrl + Debug,
        T: DeserializeOwned,
    {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(anyhow::anyhow!(
                "Request failed with status {}: {}",
                status,
                error_body
            ));
        }
        let text = response.text().await?;
        event!(Level::TRACE, response = text);

        Ok(serde_json::from_str::<T>(&text)?)
    }

    #[instrument(level = "trace", skip(self, request), fields(json_request = serde_json::to_string(request).unwrap()))]
    pub async fn post<U, S, T>(&self, url: U, request: &S) -> anyhow::Result<T>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(anyhow::anyhow!(
                "Request failed with status {}: {}",
                status,
                error_body
            ));
        }
        let text = response.text().await?;
        event!(Level::TRACE, response = text);

        Ok(serde_json::from_str::<T>(&text)?)
    }

    /// POST a request and parse the response body as a line-delimited event
    /// stream. `process` picks the JSON payload out of each complete line
    /// (e.g. stripping an SSE `data: ` prefix); lines it rejects and payloads
    /// that fail to parse are skipped, not fatal.
    #[instrument(level = "trace", skip(self, request, process), fields(json_request = serde_json::to_string(request).unwrap()))]
    pub async fn post_stream<U, S, F, T>(
        &self,
        url: U,
        request: &S,
        process: F,
    ) -> anyhow::Result<BoxedStream<T>>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned + Send + 'static,
        F: Fn(&str) -> Option<&str> + 'static + Send,
    {
        let response = self.client.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(anyhow::anyhow!(
                "Request failed with status {}: {}",
                status,
                error_body
            ));
        }

        let bytes = response.bytes_stream();

        // Buffer partial lines across chunks; a chunk boundary can land
        // anywhere, including mid-JSON.
        let buffered_stream = bytes.scan(String::new(), move |buffer, chunk| {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Error reading stream chunk: {}", e);
                    return futures::future::ready(Some(vec![]));
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            let mut events: Vec<T> = vec![];
            let mut last_newline_pos = 0;

            for (idx, _) in buffer.match_indices('\n') {
                let line = &buffer[last_newline_pos..idx];
                last_newline_pos = idx + 1;

                let Some(payload) = process(line) else {
                    continue;
                };
                if payload.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<T>(payload) {
                    Ok(parsed) => events.push(parsed),
                    Err(e) => {
                        tracing::warn!("Failed to parse stream line {:?}: {}", payload, e);
                    }
                }
            }

            // Keep the incomplete tail for the next chunk
            *buffer = buffer[last_newline_pos..].to_string();

            futures::future::ready(Some(events))
        });

        Ok(Box::pin(buffered_stream.flat_map(stream::iter)))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestEvent {
        id: u32,
        text: String,
    }

    /// Drive the same scan logic post_stream uses over a canned byte stream.
    async fn collect_events(chunks: Vec<&[u8]>) -> Vec<TestEvent> {
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = chunks
            .into_iter()
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();

        let buffered = stream::iter(chunks).scan(String::new(), |buffer, chunk| {
            let chunk = chunk.unwrap();
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            let mut events: Vec<TestEvent> = vec![];
            let mut last_newline_pos = 0;

            for (idx, _) in buffer.match_indices('\n') {
                let line = &buffer[last_newline_pos..idx];
                last_newline_pos = idx + 1;

                if let Some(payload) = line.strip_prefix("data: ") {
                    if let Ok(event) = serde_json::from_str::<TestEvent>(payload) {
                        events.push(event);
                    }
                }
            }

            *buffer = buffer[last_newline_pos..].to_string();
            futures::future::ready(Some(events))
        });

        buffered.flat_map(stream::iter).collect().await
    }

    #[tokio::test]
    async fn test_stream_complete_lines() {
        let results = collect_events(vec![
            b"data: {\"id\":1,\"text\":\"hello\"}\ndata: {\"id\":2,\"text\":\"world\"}\n",
        ])
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "hello");
        assert_eq!(results[1].text, "world");
    }

    #[tokio::test]
    async fn test_stream_split_across_chunks() {
        let results = collect_events(vec![
            b"data: {\"id\":1,\"te",
            b"xt\":\"hello\"}\ndata: {\"id\":2",
            b",\"text\":\"world\"}\n",
        ])
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[1].id, 2);
    }

    #[tokio::test]
    async fn test_stream_incomplete_final_line() {
        let results =
            collect_events(vec![b"data: {\"id\":1,\"text\":\"done\"}\ndata: {\"id\":2,\"te"])
                .await;

        // Only the complete line parses
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "done");
    }

    #[tokio::test]
    async fn test_stream_skips_malformed_and_noise() {
        let results = collect_events(vec![
            b"\ndata: {\"id\":1,\"text\":\"ok\"}\n\nnoise line\ndata: {bad json}\ndata: {\"id\":2,\"text\":\"also ok\"}\n",
        ])
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[1].id, 2);
    }

    #[tokio::test]
    async fn test_stream_single_byte_chunks() {
        let data: &[u8] = b"data: {\"id\":7,\"text\":\"slow\"}\n";
        let chunks: Vec<&[u8]> = data.chunks(1).collect();
        let results = collect_events(chunks).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 7);
    }
}
