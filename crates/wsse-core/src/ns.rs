#![forbid(unsafe_code)]

//! Namespace URIs, conventional prefixes and the element/attribute names that
//! make up the WS-Security wire format.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Encryption namespace
pub const ENC: &str = "http://www.w3.org/2001/04/xmlenc#";

/// Exclusive C14N namespace (hosts `InclusiveNamespaces`)
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// WS-Security 1.0 extension namespace
pub const WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// WS-Security 1.1 extension namespace (hosts `EncryptedHeader`)
pub const WSSE11: &str = "http://docs.oasis-open.org/wss/oasis-wss-wssecurity-secext-1.1.xsd";

/// WS-Security utility namespace (hosts `wsu:Id`)
pub const WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// SOAP message security namespace, the base of the encoding-type URIs
pub const SOAP_MESSAGE_SECURITY: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0";

/// X.509 token profile namespace, the base of the value-type URIs
pub const X509_TOKEN_PROFILE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0";

/// SOAP 1.1 envelope namespace
pub const SOAP11: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.2 envelope namespace
pub const SOAP12: &str = "http://www.w3.org/2003/05/soap-envelope";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

// ── Prefixes ─────────────────────────────────────────────────────────

pub mod prefix {
    pub const DS: &str = "ds";
    pub const XENC: &str = "xenc";
    pub const EC: &str = "ec";
    pub const WSSE: &str = "wsse";
    pub const WSSE11: &str = "wsse11";
    pub const WSU: &str = "wsu";
    pub const SOAP: &str = "soap";
    pub const XML: &str = "xml";
}

// ── Well-known identifiers ───────────────────────────────────────────

/// `wsu:Id` of the BinarySecurityToken carrying the sender certificate.
pub const SENDER_CERT: &str = "urn:oasis:names:tc:ebxml-regrep:rs:security:SenderCert";

/// `ValueType` of an X.509v3 token and of references to it.
pub const X509V3_VALUE_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";

/// `EncodingType` of a base64 BinarySecurityToken.
pub const BASE64_ENCODING_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // SOAP elements
    pub const ENVELOPE: &str = "Envelope";
    pub const HEADER: &str = "Header";
    pub const BODY: &str = "Body";

    // WS-Security elements
    pub const SECURITY: &str = "Security";
    pub const BINARY_SECURITY_TOKEN: &str = "BinarySecurityToken";
    pub const SECURITY_TOKEN_REFERENCE: &str = "SecurityTokenReference";
    pub const REFERENCE: &str = "Reference";
    pub const ENCRYPTED_HEADER: &str = "EncryptedHeader";

    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";

    // KeyInfo elements
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";
    pub const DSA_KEY_VALUE: &str = "DSAKeyValue";
    pub const DSA_P: &str = "P";
    pub const DSA_Q: &str = "Q";
    pub const DSA_G: &str = "G";
    pub const DSA_Y: &str = "Y";

    // Encryption elements
    pub const ENCRYPTED_KEY: &str = "EncryptedKey";
    pub const ENCRYPTED_DATA: &str = "EncryptedData";
    pub const ENCRYPTION_METHOD: &str = "EncryptionMethod";
    pub const CIPHER_DATA: &str = "CipherData";
    pub const CIPHER_VALUE: &str = "CipherValue";
    pub const REFERENCE_LIST: &str = "ReferenceList";
    pub const DATA_REFERENCE: &str = "DataReference";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const LOWER_ID: &str = "id";
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const TYPE: &str = "Type";
    pub const VALUE_TYPE: &str = "ValueType";
    pub const ENCODING_TYPE: &str = "EncodingType";
    pub const PREFIX_LIST: &str = "PrefixList";
    pub const MUST_UNDERSTAND: &str = "mustUnderstand";
}
