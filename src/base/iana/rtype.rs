//! Resource Record (RR) TYPEs

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource Record Types.
    ///
    /// Each resource records has a 16 bit type value indicating what kind
    /// of information is represented by the record. Only the types the
    /// resolver and its lookups care about have named values here, all
    /// others are represented by their number.
    ///
    /// See the [DNS RR TYPEs IANA registry] for an overview of assigned
    /// values.
    ///
    /// [DNS RR TYPEs IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16, "TYPE";

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias.
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Mail exchange.
    (MX => 15, "MX")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    (AAAA => 28, "AAAA")

    /// Server selection.
    (SRV => 33, "SRV")

    /// Naming authority pointer.
    (NAPTR => 35, "NAPTR")

    /// OPT.
    ///
    /// The pseudo-record carrying EDNS information.
    (OPT => 41, "OPT")

    /// Delegation signer.
    (DS => 43, "DS")

    /// RRSIG.
    (RRSIG => 46, "RRSIG")

    /// NSEC.
    (NSEC => 47, "NSEC")

    /// DNSKEY.
    (DNSKEY => 48, "DNSKEY")

    /// NSEC3.
    (NSEC3 => 50, "NSEC3")

    /// Transaction signature.
    (TSIG => 250, "TSIG")

    /// A request for all records the server/cache has available.
    (ANY => 255, "ANY")
}

impl Rtype {
    /// Returns whether the type is a pseudo-record type.
    ///
    /// Records of these types never contain actual data about a domain but
    /// rather information about the transaction at hand.
    #[must_use]
    pub fn is_pseudo(self) -> bool {
        self == Rtype::OPT || self == Rtype::TSIG
    }
}

//============ Testing ======================================================
