use chunkstash_types::ContentDigest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so digests from different uses never collide even for
/// identical bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for captured artifacts (the dedup digest).
    pub const ARTIFACT: Self = Self {
        domain: "chunkstash-artifact-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentDigest {
        let mut writer = self.writer();
        writer.update(data);
        writer.finalize()
    }

    /// Start an incremental digest, for content that arrives in pieces.
    pub fn writer(&self) -> DigestWriter {
        let mut inner = blake3::Hasher::new();
        inner.update(self.domain.as_bytes());
        inner.update(b":");
        DigestWriter { inner }
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &ContentDigest) -> bool {
        chunkstash_types::timing_safe_eq(self.hash(data).as_bytes(), expected.as_bytes())
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Incremental digest started by [`ContentHasher::writer`].
///
/// Feeding the same bytes in any split produces the same digest as
/// [`ContentHasher::hash`] over the concatenation.
pub struct DigestWriter {
    inner: blake3::Hasher,
}

impl DigestWriter {
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn finalize(&self) -> ContentDigest {
        ContentDigest::from_hash(*self.inner.finalize().as_bytes())
    }
}
